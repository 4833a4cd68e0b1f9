//! Repository-side inputs of the documentation build.
//!
//! This crate provides:
//! - [`collector`] — copies documentation sources into a staging area
//! - [`edit_link`] — derives "edit this page" URLs from a repository remote
//! - [`metadata`] — resolves per-repository descriptors from config and `rosindex.yml`

pub mod collector;
pub mod edit_link;
pub mod metadata;

pub use collector::{StagedFileMap, collect_sources, has_extension, remove_dir_if_exists, to_slash};
pub use edit_link::{Provider, RemoteLocation, edit_url};
pub use metadata::{METADATA_FILE, RepoMetadata, load_metadata, resolve_all, resolve_descriptor};
