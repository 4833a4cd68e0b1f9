//! Page tree assembly.
//!
//! Takes the fragments the compiler emitted for one repository, ties each
//! back to its staged source, attaches edit links and index flags, and
//! returns the ordered page sequence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use repodocs_shared::{Page, RepoDocsError, RepositoryDescriptor, Result};
use repodocs_sources::{StagedFileMap, edit_url, to_slash};

use crate::compiler::{FragmentFile, stem_key};
use crate::tree::{PageTree, depth, normalize_permalink};

/// Inputs shared by every fragment of one repository.
#[derive(Debug, Clone, Copy)]
pub struct AssembleContext<'a> {
    pub descriptor: &'a RepositoryDescriptor,
    pub staged: &'a StagedFileMap,
    /// Prefix of published URLs.
    pub base_url: &'a str,
}

/// Build the ordered page list of one repository.
///
/// Fragments whose source no longer exists in the staging map (stale
/// compiler output) are kept, but get no edit link, no source name and are
/// never indexed.
#[instrument(skip_all, fields(repo = %ctx.descriptor.name, fragments = fragments.len()))]
pub fn assemble(ctx: &AssembleContext<'_>, fragments: Vec<FragmentFile>) -> Result<Vec<Page>> {
    let descriptor = ctx.descriptor;
    let sources = staged_by_stem(ctx.staged);
    let mut tree = PageTree::new(&descriptor.name);

    for file in fragments {
        let origin = to_slash(&file.relative);
        let sourcename = sources
            .get(&file.stem())
            .and_then(|staged| ctx.staged.source_relative(staged));

        let (edit_link, indexed_page) = match &sourcename {
            Some(source) => {
                let link = edit_url(
                    &descriptor.url,
                    &descriptor.version,
                    &repo_relative(&descriptor.sources_dir, source),
                )?;
                (Some(link), descriptor.index_patterns.is_match(source))
            }
            None => {
                debug!(fragment = %origin, "no staged source, publishing without edit link");
                (None, false)
            }
        };

        let mut fragment = file.fragment;
        for key in Page::FIELDS {
            fragment.extra.remove(key);
        }

        let permalink = normalize_permalink(&fragment.current_page_name);
        let page = Page {
            url: page_url(ctx.base_url, &descriptor.name, &permalink),
            depth: depth(&permalink),
            permalink,
            parent: None,
            edit_url: edit_link,
            indexed_page,
            sourcename,
            title_override: None,
            fragment,
        };

        tree.insert(page, origin)?;
    }

    let pages = tree.into_ordered(&descriptor.index_patterns, descriptor.description.as_deref());

    info!(
        pages = pages.len(),
        indexable = pages.iter().filter(|p| p.indexed_page).count(),
        "page tree assembled"
    );

    Ok(pages)
}

/// Published URL of a page: `{base}/{repo}/{permalink}`.
pub fn page_url(base_url: &str, repo: &str, permalink: &str) -> String {
    format!("{}/{repo}/{permalink}", base_url.trim_end_matches('/'))
}

/// Write the ordered pages to `{dir}/pages.json`, replacing the directory.
pub fn publish_pages(dir: &Path, pages: &[Page]) -> Result<PathBuf> {
    repodocs_sources::remove_dir_if_exists(dir)?;
    std::fs::create_dir_all(dir).map_err(|e| RepoDocsError::io(dir, e))?;

    let path = dir.join("pages.json");
    let json = serde_json::to_string_pretty(pages)
        .map_err(|e| RepoDocsError::validation(format!("JSON serialization failed: {e}")))?;
    std::fs::write(&path, json).map_err(|e| RepoDocsError::io(&path, e))?;

    debug!(path = %path.display(), pages = pages.len(), "published pages");
    Ok(path)
}

/// Staged-relative path without extension → staged path.
fn staged_by_stem(staged: &StagedFileMap) -> HashMap<PathBuf, PathBuf> {
    staged
        .iter()
        .filter_map(|(_, staged_path)| {
            let rel = staged_path.strip_prefix(staged.staging_root()).ok()?;
            Some((stem_key(rel), staged_path.to_path_buf()))
        })
        .collect()
}

/// Path of a source relative to the checkout root.
fn repo_relative(sources_dir: &str, source: &str) -> String {
    let dir = sources_dir.trim_matches('/');
    if dir.is_empty() || dir == "." {
        source.to_string()
    } else {
        format!("{dir}/{source}")
    }
}
