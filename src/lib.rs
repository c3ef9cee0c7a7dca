//! wikishard - builds a static, sharded full-text index from an encyclopedia dump.
//!
//! A single sequential pass reads `<page>` elements from a (bzip2) XML dump,
//! keeps article-namespace pages, strips their markup, tokenizes them and
//! accumulates everything in memory. Once the stream is exhausted the
//! builder writes:
//! - `docs/shard_NNNNN.bin`: documents, sharded by `id % 65536`
//! - `index/shard_NNNN.bin`: delta + varint postings, sharded by `fnv1a32(term) % 4096`
//! - `index/meta.json`: document count and shard counts
//!
//! The output is meant to be served as static files; readers need nothing
//! beyond `meta.json` and the two partition functions to find a shard.

pub mod builder;
pub mod docstore;
pub mod dump;
pub mod error;
pub mod lexical;
pub mod partition;
pub mod postings;
pub mod reader;
pub mod sanitize;
pub mod storage;
pub mod types;
pub mod varint;

// Re-export commonly used types
pub use builder::{build_index, BuildConfig, BuildReport, IndexBuilder, PageOutcome};
pub use dump::{open_dump, PageReader, RawPage};
pub use error::{DumpError, Error, IndexError, Result};
pub use lexical::{tokenize, IndexAccumulator};
pub use partition::{doc_shard, fnv1a32, term_shard};
pub use reader::IndexReader;
pub use sanitize::Sanitizer;
pub use storage::{ShardStore, StagedDir, StorageError, StorageResult};
pub use types::{DocId, IndexMeta, Page, Posting, StoredDocument, DOC_SHARD_COUNT, SHARD_COUNT};
