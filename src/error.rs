//! Error types for the wikishard library.

use thiserror::Error;

/// Top-level error type for wikishard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Output storage errors.
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Index encoding/decoding errors.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// The dump file could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// The XML stream itself could not be read.
    #[error("dump error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The stream ended while a `<page>` element was still open.
    #[error("dump ended inside a <page> element")]
    TruncatedDump,

    /// Sanitizer pattern failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Metadata (de)serialization errors.
    #[error("metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while encoding or decoding shard files.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A payload does not fit the fixed-width length field in front of it.
    #[error("{field} is {len} bytes, exceeds the {max}-byte length field")]
    FieldOverflow {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A posting handed to an encoder breaks the position invariants.
    #[error("invalid posting for doc {doc_id}: {reason}")]
    InvalidPosting { doc_id: u32, reason: &'static str },

    /// A shard file violates the layout or its ordering invariants.
    #[error("corrupt shard: {0}")]
    Corrupt(String),

    /// Document with duplicate ID.
    #[error("duplicate document ID: {0}")]
    DuplicateId(u32),
}

/// Structural defects in a single `<page>` element.
///
/// These never abort a build; the page is skipped and counted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DumpError {
    /// A required child element was absent.
    #[error("page is missing <{0}>")]
    MissingField(&'static str),

    /// A numeric child element did not parse.
    #[error("page <{field}> is not a valid integer: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// Character data could not be unescaped or decoded.
    #[error("page text is malformed: {0}")]
    InvalidText(String),
}

/// Result type for wikishard operations.
pub type Result<T> = std::result::Result<T, Error>;
