//! Core domain types for repodocs page trees and search indexes.

use std::path::PathBuf;

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{RepoDocsError, Result};

/// Sources subdirectory used when the metadata file does not name one.
pub const DEFAULT_SOURCES_DIR: &str = "source";

/// Index patterns used when the metadata file does not name any.
pub const DEFAULT_INDEX_PATTERNS: [&str; 2] = ["*.rst", "**/*.rst"];

// ---------------------------------------------------------------------------
// IndexPatterns
// ---------------------------------------------------------------------------

/// Ordered list of compiled glob patterns.
///
/// Position matters: the index of the first matching pattern is a sort key
/// for pages of equal depth.
#[derive(Debug, Clone)]
pub struct IndexPatterns {
    raw: Vec<String>,
    matchers: Vec<GlobMatcher>,
}

impl IndexPatterns {
    /// Compile every pattern, failing on the first malformed one.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let matchers = raw
            .iter()
            .map(|pattern| compile(pattern))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { raw, matchers })
    }

    /// Position of the first pattern matching `path`.
    pub fn position(&self, path: &str) -> Option<usize> {
        self.matchers.iter().position(|m| m.is_match(path))
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.position(path).is_some()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.raw
    }
}

impl Default for IndexPatterns {
    fn default() -> Self {
        let raw: Vec<String> = DEFAULT_INDEX_PATTERNS.iter().map(|p| p.to_string()).collect();
        let matchers = raw
            .iter()
            .filter_map(|p| compile(p).ok())
            .collect();
        Self { raw, matchers }
    }
}

/// Case-insensitive, like the source extension filter, so a staged
/// `index.RST` matches `*.rst`.
fn compile(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| RepoDocsError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.kind().to_string(),
        })
}

impl Serialize for IndexPatterns {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// RepositoryDescriptor
// ---------------------------------------------------------------------------

/// Fully resolved settings for one documentation repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryDescriptor {
    /// Repository name; scopes staging, build and published paths.
    pub name: String,
    /// Remote URL (HTTPS or SSH form).
    pub url: String,
    /// Branch, tag or commit used in edit links.
    pub version: String,
    /// Documentation subdirectory inside the checkout.
    pub sources_dir: String,
    /// Patterns selecting indexable sources, in priority order.
    pub index_patterns: IndexPatterns,
    /// Synthetic title for pages that have no parent in the tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Local checkout root.
    pub checkout: PathBuf,
}

impl RepositoryDescriptor {
    /// Absolute location of the documentation sources.
    pub fn sources_root(&self) -> PathBuf {
        self.checkout.join(&self.sources_dir)
    }
}

// ---------------------------------------------------------------------------
// PageFragment / Page
// ---------------------------------------------------------------------------

/// One compiler-emitted JSON fragment.
///
/// Fields we do not interpret are kept in `extra` and published untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageFragment {
    /// Canonical page path, e.g. `guide/index`. Required.
    pub current_page_name: String,
    /// Page title; may contain HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Rendered HTML body.
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A fragment placed in a repository's page tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Normalized path within the repository; empty for the root page.
    pub permalink: String,
    /// Published site URL.
    pub url: String,
    /// Number of `/` separators in the permalink.
    pub depth: usize,
    /// Permalink of the parent page, if it exists in the tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Link to edit the source on its hosting service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_url: Option<String>,
    /// Whether the page goes into the search index.
    #[serde(default)]
    pub indexed_page: bool,
    /// Source path relative to the repository's sources directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcename: Option<String>,
    /// Repository description standing in for the title of ownerless pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_override: Option<String>,
    #[serde(flatten)]
    pub fragment: PageFragment,
}

impl Page {
    /// Keys owned by the page itself; same-named fragment keys are dropped.
    pub const FIELDS: [&str; 8] = [
        "permalink",
        "url",
        "depth",
        "parent",
        "edit_url",
        "indexed_page",
        "sourcename",
        "title_override",
    ];

    /// Title used for ordering; missing titles compare as empty.
    pub fn title(&self) -> &str {
        self.fragment.title.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// IndexEntry
// ---------------------------------------------------------------------------

/// One document in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Dense build-wide id, starting at 0.
    pub id: u64,
    pub url: String,
    /// Plain-text title.
    pub title: String,
    /// Plain-text body.
    pub content: String,
}
