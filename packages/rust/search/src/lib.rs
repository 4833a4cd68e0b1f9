//! Sharded full-text search index over published pages.
//!
//! This crate provides:
//! - [`IndexBuilder`] — assigns dense ids and extracts plain text
//! - [`partition`] — splits entries into contiguous shards
//! - [`write_index`] — serializes shards plus a manifest under `search/docs/`

pub mod builder;
pub mod shard;

pub use builder::{INDEXED_FIELDS, IndexBuilder, REFERENCE_FIELD};
pub use shard::{IndexManifest, SearchShard, ShardMeta, load_shard, partition, write_index};
