//! Build configuration for repodocs.
//!
//! The site config lives in `repodocs.toml` in the working directory unless
//! `--config` points elsewhere. A missing file means defaults.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RepoDocsError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "repodocs.toml";

/// Output subdirectory taken by the search index.
pub const RESERVED_OUTPUT_NAME: &str = "search";

// ---------------------------------------------------------------------------
// Config structs (matching repodocs.toml schema)
// ---------------------------------------------------------------------------

/// Top-level build config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Paths and global switches.
    #[serde(default)]
    pub site: SiteSection,

    /// External fragment compiler invocation.
    #[serde(default)]
    pub compiler: CompilerSection,

    /// Documentation repositories, processed in this order.
    #[serde(default)]
    pub docs_repos: Vec<DocsRepoEntry>,

    /// Remote repository registry keyed by repository name.
    #[serde(default)]
    pub remote_repos: BTreeMap<String, RemoteRepoEntry>,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSection {
    /// Prefix for published page URLs.
    #[serde(default)]
    pub base_url: String,

    /// Directory holding repository checkouts (`{checkout_root}/{name}`).
    #[serde(default = "default_checkout_root")]
    pub checkout_root: PathBuf,

    /// Scratch directory for staged sources.
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// Compiler output directory.
    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,

    /// Published pages and search index.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Skip the search index entirely.
    #[serde(default)]
    pub skip_search_index: bool,

    /// Number of search index shards.
    #[serde(default = "default_shards")]
    pub search_index_shards: usize,

    /// Repositories processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            checkout_root: default_checkout_root(),
            staging_root: default_staging_root(),
            build_root: default_build_root(),
            output_dir: default_output_dir(),
            skip_search_index: false,
            search_index_shards: default_shards(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_checkout_root() -> PathBuf {
    "_repos".into()
}
fn default_staging_root() -> PathBuf {
    "_staging".into()
}
fn default_build_root() -> PathBuf {
    "_build".into()
}
fn default_output_dir() -> PathBuf {
    "_site".into()
}
fn default_shards() -> usize {
    1
}
fn default_concurrency() -> usize {
    4
}

/// `[compiler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerSection {
    /// Executable to run.
    #[serde(default = "default_program")]
    pub program: String,

    /// Leading arguments; the staged dir and output dir are appended.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Per-repository wall-clock limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extension of documentation sources (case-insensitive).
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Extension of emitted fragments.
    #[serde(default = "default_fragment_extension")]
    pub fragment_extension: String,

    /// Fail a repository when a staged source has no fragment.
    #[serde(default = "default_true")]
    pub require_all_fragments: bool,
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            timeout_secs: default_timeout_secs(),
            source_extension: default_source_extension(),
            fragment_extension: default_fragment_extension(),
            require_all_fragments: true,
        }
    }
}

impl CompilerSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_program() -> String {
    "sphinx-build".into()
}
fn default_args() -> Vec<String> {
    ["-b", "json", "-q", "-C"].iter().map(|s| s.to_string()).collect()
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_source_extension() -> String {
    "rst".into()
}
fn default_fragment_extension() -> String {
    "fjson".into()
}
fn default_true() -> bool {
    true
}

/// `[[docs_repos]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsRepoEntry {
    pub name: String,
    /// Synthetic title for pages without a parent in the tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `[remote_repos.<name>]` entry; overrides the repository's metadata file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteRepoEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Checkout location, when not `{checkout_root}/{name}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl SiteConfig {
    /// Check values serde cannot constrain on its own.
    pub fn validate(&self) -> Result<()> {
        if self.site.search_index_shards == 0 {
            return Err(RepoDocsError::config("search_index_shards must be at least 1"));
        }
        if self.site.concurrency == 0 {
            return Err(RepoDocsError::config("concurrency must be at least 1"));
        }
        if self.compiler.program.trim().is_empty() {
            return Err(RepoDocsError::config("compiler program must not be empty"));
        }

        let mut seen = HashSet::new();
        for repo in &self.docs_repos {
            if repo.name.is_empty() || repo.name.contains(['/', '\\']) || repo.name == ".." {
                return Err(RepoDocsError::config(format!(
                    "invalid repository name '{}'",
                    repo.name
                )));
            }
            if repo.name == RESERVED_OUTPUT_NAME {
                return Err(RepoDocsError::config(format!(
                    "repository name '{RESERVED_OUTPUT_NAME}' collides with the search index directory"
                )));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(RepoDocsError::config(format!(
                    "repository '{}' listed more than once in docs_repos",
                    repo.name
                )));
            }
        }

        Ok(())
    }

    /// Directory of the search index shards.
    pub fn search_dir(&self) -> PathBuf {
        self.site.output_dir.join(RESERVED_OUTPUT_NAME).join("docs")
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load `repodocs.toml` from the working directory, or defaults if absent.
pub fn load_config() -> Result<SiteConfig> {
    let path = PathBuf::from(CONFIG_FILE_NAME);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(SiteConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<SiteConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RepoDocsError::io(path, e))?;

    let config: SiteConfig = toml::from_str(&content).map_err(|e| {
        RepoDocsError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Write a default config file to `path`. Refuses to overwrite.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(RepoDocsError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RepoDocsError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&SiteConfig::default())
        .map_err(|e| RepoDocsError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| RepoDocsError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = SiteConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("search_index_shards"));
        assert!(toml_str.contains("sphinx-build"));
    }

    #[test]
    fn config_roundtrip() {
        let config = SiteConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: SiteConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.site.search_index_shards, 1);
        assert_eq!(parsed.compiler.fragment_extension, "fjson");
        assert!(parsed.compiler.require_all_fragments);
    }

    #[test]
    fn config_with_repos() {
        let toml_str = r#"
[site]
skip_search_index = true
search_index_shards = 3

[[docs_repos]]
name = "widgets"
description = "Widget toolkit"

[[docs_repos]]
name = "gadgets"

[remote_repos.widgets]
url = "https://github.com/acme/widgets.git"
version = "main"
"#;
        let config: SiteConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.site.skip_search_index);
        assert_eq!(config.site.search_index_shards, 3);
        assert_eq!(config.docs_repos.len(), 2);
        assert_eq!(config.docs_repos[0].name, "widgets");
        assert_eq!(config.docs_repos[1].description, None);
        assert_eq!(
            config.remote_repos["widgets"].version.as_deref(),
            Some("main")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_shards_rejected() {
        let mut config = SiteConfig::default();
        config.site.search_index_shards = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search_index_shards"));
    }

    #[test]
    fn duplicate_repo_rejected() {
        let mut config = SiteConfig::default();
        for _ in 0..2 {
            config.docs_repos.push(DocsRepoEntry {
                name: "widgets".into(),
                description: None,
            });
        }
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn search_is_reserved() {
        let mut config = SiteConfig::default();
        config.docs_repos.push(DocsRepoEntry {
            name: "search".into(),
            description: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn init_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("repodocs.toml");

        init_config(&path).unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.site.concurrency, 4);

        assert!(init_config(&path).is_err());
    }
}
