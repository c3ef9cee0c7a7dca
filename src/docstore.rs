//! Document shard format.
//!
//! ```text
//! u32 LE  document count
//! per document, in insertion order:
//!   u32 LE  id
//!   u16 LE  title length, then title bytes
//!   u32 LE  content length, then content bytes
//! ```

use crate::error::IndexError;
use crate::types::StoredDocument;
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};

/// Longest title the 16-bit length field can describe.
pub const MAX_TITLE_LEN: usize = u16::MAX as usize;

/// Longest content the 32-bit length field can describe.
pub const MAX_CONTENT_LEN: usize = u32::MAX as usize;

/// Check a document's payloads against the length fields.
pub fn check_lengths(title: &str, content: &str) -> Result<(), IndexError> {
    if title.len() > MAX_TITLE_LEN {
        return Err(IndexError::FieldOverflow {
            field: "title",
            len: title.len(),
            max: MAX_TITLE_LEN,
        });
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(IndexError::FieldOverflow {
            field: "content",
            len: content.len(),
            max: MAX_CONTENT_LEN,
        });
    }
    Ok(())
}

/// Encode one document shard.
pub fn encode_shard(docs: &[StoredDocument]) -> Result<Bytes, IndexError> {
    let count = u32::try_from(docs.len()).map_err(|_| IndexError::FieldOverflow {
        field: "document count",
        len: docs.len(),
        max: u32::MAX as usize,
    })?;

    let payload: usize = docs.iter().map(|d| 10 + d.title.len() + d.content.len()).sum();
    let mut buf = BytesMut::with_capacity(4 + payload);
    buf.put_u32_le(count);

    for doc in docs {
        check_lengths(&doc.title, &doc.content)?;
        buf.put_u32_le(doc.id);
        buf.put_u16_le(doc.title.len() as u16);
        buf.put_slice(doc.title.as_bytes());
        buf.put_u32_le(doc.content.len() as u32);
        buf.put_slice(doc.content.as_bytes());
    }

    Ok(buf.freeze())
}

/// Decode a document shard.
pub fn decode_shard(data: &[u8]) -> Result<Vec<StoredDocument>, IndexError> {
    let mut cursor = data;
    let count = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
    let mut docs = Vec::with_capacity(count.min(1 << 16) as usize);

    for _ in 0..count {
        let id = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        let title_len = cursor.read_u16::<LittleEndian>().map_err(truncated)? as usize;
        let title = read_str(&mut cursor, title_len, "title")?;
        let content_len = cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        let content = read_str(&mut cursor, content_len, "content")?;
        docs.push(StoredDocument { id, title, content });
    }

    if !cursor.is_empty() {
        return Err(IndexError::Corrupt(format!(
            "{} trailing bytes after {} documents",
            cursor.len(),
            count
        )));
    }

    Ok(docs)
}

fn read_str(cursor: &mut &[u8], len: usize, field: &str) -> Result<String, IndexError> {
    let bytes: &[u8] = *cursor;
    if bytes.len() < len {
        return Err(IndexError::Corrupt(format!("truncated {}", field)));
    }
    let (head, rest) = bytes.split_at(len);
    *cursor = rest;
    String::from_utf8(head.to_vec())
        .map_err(|e| IndexError::Corrupt(format!("{} is not UTF-8: {}", field, e)))
}

fn truncated(e: std::io::Error) -> IndexError {
    IndexError::Corrupt(format!("truncated document shard: {}", e))
}
