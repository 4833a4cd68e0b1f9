//! Per-repository page tree and its ordering.
//!
//! Pages are keyed by permalink and flattened into a sequence ordered by
//! depth, then index-pattern position, then title. Parents are linked while
//! walking that sequence.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use repodocs_shared::{IndexPatterns, Page, RepoDocsError, Result};

/// Permalink → page for one repository.
#[derive(Debug, Clone)]
pub struct PageTree {
    repo: String,
    pages: BTreeMap<String, Page>,
    /// Permalink → fragment that produced it, for conflict messages.
    origins: BTreeMap<String, String>,
}

impl PageTree {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            pages: BTreeMap::new(),
            origins: BTreeMap::new(),
        }
    }

    /// Insert a page, failing if its permalink is already taken.
    ///
    /// `origin` names the fragment the page came from.
    pub fn insert(&mut self, page: Page, origin: impl Into<String>) -> Result<()> {
        let origin = origin.into();
        if let Some(first) = self.origins.get(&page.permalink) {
            return Err(RepoDocsError::AssemblyConflict {
                repo: self.repo.clone(),
                permalink: page.permalink.clone(),
                first: first.clone(),
                second: origin,
            });
        }

        self.origins.insert(page.permalink.clone(), origin);
        self.pages.insert(page.permalink.clone(), page);
        Ok(())
    }

    pub fn get(&self, permalink: &str) -> Option<&Page> {
        self.pages.get(permalink)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Flatten into render order and link parents.
    ///
    /// Pages without a parent in the tree take `description` as their
    /// `title_override` when one is given.
    pub fn into_ordered(self, patterns: &IndexPatterns, description: Option<&str>) -> Vec<Page> {
        let mut pages: Vec<Page> = self.pages.into_values().collect();
        pages.sort_by(|a, b| compare_pages(a, b, patterns));
        link_parents(&mut pages, description);

        debug!(repo = %self.repo, pages = pages.len(), "page tree ordered");
        pages
    }
}

/// Drop a trailing `index` segment from a canonical page name.
///
/// `index` becomes the empty root permalink; `guide/index` becomes `guide`.
pub fn normalize_permalink(canonical: &str) -> String {
    let name = canonical.trim_matches('/');
    let permalink = match name.rsplit_once('/') {
        Some((dir, "index")) => dir,
        None if name == "index" => "",
        _ => name,
    };

    if permalink == "." {
        String::new()
    } else {
        permalink.to_string()
    }
}

/// Number of `/` separators in a permalink.
pub fn depth(permalink: &str) -> usize {
    permalink.matches('/').count()
}

/// Permalink of the page one level up. The root has none; top-level pages
/// hang off the root.
pub fn parent_permalink(permalink: &str) -> Option<&str> {
    if permalink.is_empty() {
        return None;
    }
    Some(permalink.rsplit_once('/').map_or("", |(dir, _)| dir))
}

/// Position of the page's source among the patterns; `None` (sorting
/// first) when it has no source or matches nothing.
pub fn pattern_position(page: &Page, patterns: &IndexPatterns) -> Option<usize> {
    page.sourcename
        .as_deref()
        .and_then(|source| patterns.position(source))
}

/// Total order over pages of one repository.
///
/// 1. depth, shallower first, with the root page ahead of its depth-0 siblings
/// 2. index-pattern position, unmatched first
/// 3. title, case-sensitive, missing as empty
/// 4. permalink
pub fn compare_pages(a: &Page, b: &Page, patterns: &IndexPatterns) -> Ordering {
    a.depth
        .cmp(&b.depth)
        .then_with(|| (!a.permalink.is_empty()).cmp(&!b.permalink.is_empty()))
        .then_with(|| pattern_position(a, patterns).cmp(&pattern_position(b, patterns)))
        .then_with(|| a.title().cmp(b.title()))
        .then_with(|| a.permalink.cmp(&b.permalink))
}

/// Set `parent` on each page whose parent was emitted earlier in `pages`.
pub fn link_parents(pages: &mut [Page], description: Option<&str>) {
    let mut emitted: HashSet<String> = HashSet::with_capacity(pages.len());

    for page in pages.iter_mut() {
        let parent = parent_permalink(&page.permalink)
            .filter(|p| emitted.contains(*p))
            .map(str::to_string);

        if parent.is_none() {
            page.title_override = description.map(str::to_string);
        }
        page.parent = parent;
        emitted.insert(page.permalink.clone());
    }
}
