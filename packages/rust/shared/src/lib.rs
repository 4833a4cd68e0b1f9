//! Shared types, error model, and configuration for repodocs.
//!
//! This crate is the foundation depended on by all other repodocs crates.
//! It provides:
//! - [`RepoDocsError`] — the unified error type
//! - Domain types ([`RepositoryDescriptor`], [`PageFragment`], [`Page`], [`IndexEntry`])
//! - Configuration ([`SiteConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, CompilerSection, DocsRepoEntry, RESERVED_OUTPUT_NAME, RemoteRepoEntry,
    SiteConfig, SiteSection, init_config, load_config, load_config_from,
};
pub use error::{RepoDocsError, Result, UnsupportedProviderError};
pub use types::{
    DEFAULT_INDEX_PATTERNS, DEFAULT_SOURCES_DIR, IndexEntry, IndexPatterns, Page, PageFragment,
    RepositoryDescriptor,
};
