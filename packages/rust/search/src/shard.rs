//! Shard layout and serialization.
//!
//! Writes the following under the search directory:
//! ```text
//! search/docs/
//! ├── index_0.json
//! ├── index_1.json
//! └── manifest.json
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use repodocs_shared::{IndexEntry, RepoDocsError, Result};
use repodocs_text::tokenize;

use crate::builder::{INDEXED_FIELDS, REFERENCE_FIELD};

/// One independently loadable part of the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchShard {
    /// Shard number, starting at 0.
    pub shard: usize,
    /// Name of the document key field.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Indexed field names.
    pub fields: Vec<String>,
    /// Documents in id order.
    pub documents: Vec<IndexEntry>,
    /// term → field → ids containing the term.
    pub index: BTreeMap<String, BTreeMap<String, Vec<u64>>>,
}

impl SearchShard {
    /// Build the inverted index over `documents`.
    pub fn build(shard: usize, documents: Vec<IndexEntry>) -> Self {
        let mut index: BTreeMap<String, BTreeMap<String, Vec<u64>>> = BTreeMap::new();

        for doc in &documents {
            for (field, text) in [(INDEXED_FIELDS[0], &doc.title), (INDEXED_FIELDS[1], &doc.content)] {
                let terms: BTreeSet<String> = tokenize(text).collect();
                for term in terms {
                    index
                        .entry(term)
                        .or_default()
                        .entry(field.to_string())
                        .or_default()
                        .push(doc.id);
                }
            }
        }

        Self {
            shard,
            reference: REFERENCE_FIELD.to_string(),
            fields: INDEXED_FIELDS.iter().map(|f| f.to_string()).collect(),
            documents,
            index,
        }
    }
}

/// Manifest entry for one shard file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardMeta {
    pub filename: String,
    pub documents: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<u64>,
    pub sha256: String,
    pub size_bytes: usize,
}

/// `manifest.json` listing every shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub reference_field: String,
    pub indexed_fields: Vec<String>,
    pub total_documents: usize,
    pub generated_at: DateTime<Utc>,
    pub shards: Vec<ShardMeta>,
}

/// Split entries into `shards` contiguous, near-equal parts.
///
/// The first `len % shards` parts hold one extra entry. Parts may be empty
/// when there are fewer entries than shards. A shard count of 0 is treated
/// as 1.
pub fn partition(entries: Vec<IndexEntry>, shards: usize) -> Vec<Vec<IndexEntry>> {
    let shards = shards.max(1);
    let base = entries.len() / shards;
    let extra = entries.len() % shards;

    let mut parts = Vec::with_capacity(shards);
    let mut rest = entries.into_iter();
    for i in 0..shards {
        let size = base + usize::from(i < extra);
        parts.push(rest.by_ref().take(size).collect());
    }
    parts
}

/// Write all shards and the manifest into `dir`, replacing previous content.
#[instrument(skip_all, fields(dir = %dir.display(), entries = entries.len(), shards))]
pub fn write_index(dir: &Path, entries: Vec<IndexEntry>, shards: usize) -> Result<IndexManifest> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!("removed previous search index"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(RepoDocsError::io(dir, e)),
    }
    std::fs::create_dir_all(dir).map_err(|e| RepoDocsError::io(dir, e))?;

    let total_documents = entries.len();
    let mut metas = Vec::new();

    for (n, documents) in partition(entries, shards).into_iter().enumerate() {
        let filename = format!("index_{n}.json");
        let first_id = documents.first().map(|d| d.id);
        let last_id = documents.last().map(|d| d.id);
        let count = documents.len();

        let json = serde_json::to_string(&SearchShard::build(n, documents)).map_err(|e| {
            RepoDocsError::validation(format!("shard serialization failed: {e}"))
        })?;
        write_atomic(dir, &filename, &json)?;

        debug!(file = %filename, documents = count, "wrote search shard");

        metas.push(ShardMeta {
            filename,
            documents: count,
            first_id,
            last_id,
            sha256: sha256_hex(&json),
            size_bytes: json.len(),
        });
    }

    let manifest = IndexManifest {
        reference_field: REFERENCE_FIELD.to_string(),
        indexed_fields: INDEXED_FIELDS.iter().map(|f| f.to_string()).collect(),
        total_documents,
        generated_at: Utc::now(),
        shards: metas,
    };

    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| RepoDocsError::validation(format!("JSON serialization failed: {e}")))?;
    write_atomic(dir, "manifest.json", &json)?;

    info!(
        documents = total_documents,
        shards = manifest.shards.len(),
        "search index written"
    );

    Ok(manifest)
}

/// Read one shard file back.
pub fn load_shard(path: &Path) -> Result<SearchShard> {
    let content = std::fs::read_to_string(path).map_err(|e| RepoDocsError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| RepoDocsError::validation(format!("invalid shard {}: {e}", path.display())))
}

/// Write to a temp file, then rename over the target.
fn write_atomic(dir: &Path, filename: &str, content: &str) -> Result<()> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));

    std::fs::write(&temp, content).map_err(|e| RepoDocsError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| RepoDocsError::io(&target, e))?;
    Ok(())
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: u64) -> Vec<IndexEntry> {
        (0..n)
            .map(|id| IndexEntry {
                id,
                url: format!("/repo/page-{id}"),
                title: format!("Page {id}"),
                content: if id % 2 == 0 { "even widget".into() } else { "odd gadget".into() },
            })
            .collect()
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        for total in [0u64, 1, 5, 7, 10] {
            for shards in 1..=4 {
                let parts = partition(entries(total), shards);
                assert_eq!(parts.len(), shards);

                let ids: Vec<u64> = parts.iter().flatten().map(|e| e.id).collect();
                assert_eq!(ids, (0..total).collect::<Vec<_>>());

                let sizes: Vec<usize> = parts.iter().map(Vec::len).collect();
                let max = sizes.iter().max().copied().unwrap_or(0);
                let min = sizes.iter().min().copied().unwrap_or(0);
                assert!(max - min <= 1, "uneven split {sizes:?}");
            }
        }
    }

    #[test]
    fn zero_shards_means_one() {
        let parts = partition(entries(3), 0);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 3);
    }

    #[test]
    fn shard_builds_inverted_index() {
        let shard = SearchShard::build(0, entries(3));
        assert_eq!(shard.reference, "id");
        assert_eq!(shard.fields, ["title", "content"]);
        assert_eq!(shard.index["widget"]["content"], [0, 2]);
        assert_eq!(shard.index["page"]["title"], [0, 1, 2]);
        assert!(!shard.index["gadget"].contains_key("title"));
    }

    #[test]
    fn write_index_produces_loadable_shards() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("search/docs");

        let manifest = write_index(&dir, entries(5), 2).unwrap();
        assert_eq!(manifest.total_documents, 5);
        assert_eq!(manifest.shards.len(), 2);
        assert_eq!(manifest.shards[0].first_id, Some(0));
        assert_eq!(manifest.shards[0].last_id, Some(2));
        assert_eq!(manifest.shards[1].first_id, Some(3));
        assert_eq!(manifest.shards[0].sha256.len(), 64);

        let first = load_shard(&dir.join("index_0.json")).unwrap();
        let second = load_shard(&dir.join("index_1.json")).unwrap();
        let ids: Vec<u64> = first
            .documents
            .iter()
            .chain(&second.documents)
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, [0, 1, 2, 3, 4]);
        assert!(dir.join("manifest.json").exists());
    }

    #[test]
    fn rewrite_drops_stale_shards() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("docs");

        write_index(&dir, entries(4), 4).unwrap();
        assert!(dir.join("index_3.json").exists());

        write_index(&dir, entries(4), 1).unwrap();
        assert!(!dir.join("index_3.json").exists());

        for entry in std::fs::read_dir(&dir).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }
    }
}
