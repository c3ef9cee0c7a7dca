//! Core types for the wikishard index.

use serde::{Deserialize, Serialize};

/// Document identifier type (the page id from the dump, never reassigned).
pub type DocId = u32;

/// Token position within a document, counted in tokens.
pub type Position = u32;

/// Number of index shards; a term lives in `fnv1a32(term) % SHARD_COUNT`.
pub const SHARD_COUNT: u32 = 4096;

/// Number of document shards; a document lives in `id % DOC_SHARD_COUNT`.
pub const DOC_SHARD_COUNT: u32 = 65536;

/// The article namespace. Pages in any other namespace are discarded.
pub const MAIN_NAMESPACE: i64 = 0;

/// A page as read from the dump, before sanitization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Page title.
    pub title: String,
    /// Page identifier.
    pub id: DocId,
    /// Namespace number.
    pub ns: i64,
    /// Raw markup of the latest revision.
    pub text: String,
}

impl Page {
    /// Whether this page belongs to the article namespace.
    pub fn is_article(&self) -> bool {
        self.ns == MAIN_NAMESPACE
    }
}

/// Stored document data (serialized in document shards).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Document ID.
    pub id: DocId,
    /// Page title.
    pub title: String,
    /// Sanitized plain text.
    pub content: String,
}

/// One document's occurrences of a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Strictly ascending token positions; never empty.
    pub positions: Vec<Position>,
}

impl Posting {
    pub fn new(doc_id: DocId, positions: Vec<Position>) -> Self {
        Self { doc_id, positions }
    }
}

/// Global record a reader needs to locate shards (`index/meta.json`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMeta {
    /// Total number of stored documents.
    pub doc_count: u64,
    /// Number of index shards.
    pub shard_count: u32,
    /// Number of document shards.
    pub doc_shard_count: u32,
}

impl IndexMeta {
    /// Metadata for an index holding `doc_count` documents.
    pub fn new(doc_count: u64) -> Self {
        Self {
            doc_count,
            shard_count: SHARD_COUNT,
            doc_shard_count: DOC_SHARD_COUNT,
        }
    }
}
