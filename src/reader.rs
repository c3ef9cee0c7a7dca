//! Index reader: opens a built output directory and decodes shards.
//!
//! This is the inverse of the writers, used to verify output. It does exact
//! term and document-id lookups only.

use crate::builder::{doc_shard_path, index_shard_path, META_PATH};
use crate::docstore;
use crate::error::{IndexError, Result};
use crate::partition::{doc_shard, term_shard};
use crate::postings::{self, TermPostings};
use crate::types::{DocId, IndexMeta, Posting, StoredDocument, DOC_SHARD_COUNT, SHARD_COUNT};
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read-only view over a built index.
pub struct IndexReader {
    /// Output root (the directory holding `docs/` and `index/`).
    root: PathBuf,
    meta: IndexMeta,
}

impl IndexReader {
    /// Open an index by parsing its metadata.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let meta: IndexMeta = serde_json::from_slice(&fs::read(root.join(META_PATH))?)?;

        if meta.shard_count != SHARD_COUNT || meta.doc_shard_count != DOC_SHARD_COUNT {
            return Err(IndexError::Corrupt(format!(
                "unsupported shard layout {}/{}",
                meta.shard_count, meta.doc_shard_count
            ))
            .into());
        }

        Ok(Self { root, meta })
    }

    /// Metadata as written by the builder.
    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> u64 {
        self.meta.doc_count
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a shard file; a missing file means an empty shard.
    fn map(&self, rel: &str) -> Result<Option<Mmap>> {
        let file = match File::open(self.root.join(rel)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // SAFETY: shard files are written once by the builder and never
        // modified while an index is being read.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Some(mmap))
    }

    /// Every term entry of one index shard, in stored order.
    pub fn index_shard(&self, shard: u32) -> Result<Vec<TermPostings>> {
        match self.map(&index_shard_path(shard))? {
            Some(mmap) => Ok(postings::decode_shard(&mmap)?),
            None => Ok(Vec::new()),
        }
    }

    /// Postings for `term`, ascending by document id. Empty if absent.
    pub fn postings(&self, term: &str) -> Result<Vec<Posting>> {
        match self.map(&index_shard_path(term_shard(term)))? {
            Some(mmap) => Ok(postings::find_term(&mmap, term)?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Every document of one document shard, in insertion order.
    pub fn doc_shard(&self, shard: u32) -> Result<Vec<StoredDocument>> {
        match self.map(&doc_shard_path(shard))? {
            Some(mmap) => Ok(docstore::decode_shard(&mmap)?),
            None => Ok(Vec::new()),
        }
    }

    /// Look up a stored document by id.
    pub fn document(&self, id: DocId) -> Result<Option<StoredDocument>> {
        Ok(self
            .doc_shard(doc_shard(id))?
            .into_iter()
            .find(|doc| doc.id == id))
    }
}
