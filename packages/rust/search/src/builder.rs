//! Search entry accumulation.

use tracing::debug;

use repodocs_shared::{IndexEntry, Page};
use repodocs_text::html_to_text;

/// Field the index is keyed by.
pub const REFERENCE_FIELD: &str = "id";

/// Fields whose terms are indexed.
pub const INDEXED_FIELDS: [&str; 2] = ["title", "content"];

/// Collects index entries across repositories.
///
/// Ids are dense and follow insertion order, so callers must feed pages in a
/// fixed repository order to keep ids stable between builds.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    entries: Vec<IndexEntry>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document and return its id.
    pub fn add(&mut self, url: impl Into<String>, title_html: &str, body_html: &str) -> u64 {
        let id = self.entries.len() as u64;
        let entry = IndexEntry {
            id,
            url: url.into(),
            title: html_to_text(title_html),
            content: html_to_text(body_html),
        };
        debug!(id, url = %entry.url, "indexed page");
        self.entries.push(entry);
        id
    }

    /// Add a page if it is marked indexable.
    pub fn add_page(&mut self, page: &Page) -> Option<u64> {
        page.indexed_page
            .then(|| self.add(page.url.clone(), page.title(), &page.fragment.body))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn finish(self) -> Vec<IndexEntry> {
        self.entries
    }
}
