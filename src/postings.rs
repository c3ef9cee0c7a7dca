//! Index shard format: sorted terms with delta + varint compressed postings.
//!
//! Layout of one shard file, repeated per term in ascending byte order:
//!
//! ```text
//! u8      term length
//! [u8]    term bytes (UTF-8)
//! u32 LE  posting count
//! per posting, ascending doc id:
//!   varint  doc id delta (from the previous posting, first from 0)
//!   varint  position count
//!   varint  position deltas (from the previous position in this posting)
//! ```

use crate::error::IndexError;
use crate::lexical::{ShardPostings, MAX_TERM_LEN};
use crate::types::{DocId, Position, Posting};
use crate::varint;
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};

/// A decoded term entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermPostings {
    pub term: String,
    pub postings: Vec<Posting>,
}

/// Encode one index shard.
///
/// Sorts terms and each term's postings, then writes them in the shard
/// layout. Rejects terms longer than 255 bytes, repeated doc ids within a
/// term, and empty or non-ascending position lists.
pub fn encode_shard(shard: ShardPostings) -> Result<Bytes, IndexError> {
    let mut terms: Vec<(String, Vec<Posting>)> = shard.into_iter().collect();
    terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let mut buf = BytesMut::new();
    for (term, mut postings) in terms {
        postings.sort_unstable_by_key(|p| p.doc_id);
        encode_term(&mut buf, &term, &postings)?;
    }

    Ok(buf.freeze())
}

fn encode_term(buf: &mut BytesMut, term: &str, postings: &[Posting]) -> Result<(), IndexError> {
    if term.len() > MAX_TERM_LEN {
        return Err(IndexError::FieldOverflow {
            field: "term",
            len: term.len(),
            max: MAX_TERM_LEN,
        });
    }
    let count = u32::try_from(postings.len()).map_err(|_| IndexError::FieldOverflow {
        field: "posting count",
        len: postings.len(),
        max: u32::MAX as usize,
    })?;

    // Header plus the doc-id delta of every posting.
    buf.reserve(1 + term.len() + 4 + postings.len() * varint::MAX_LEN);
    buf.put_u8(term.len() as u8);
    buf.put_slice(term.as_bytes());
    buf.put_u32_le(count);

    let mut prev_doc: Option<DocId> = None;
    for posting in postings {
        let delta = match prev_doc {
            None => posting.doc_id,
            Some(prev) if posting.doc_id > prev => posting.doc_id - prev,
            Some(_) => return Err(IndexError::DuplicateId(posting.doc_id)),
        };
        prev_doc = Some(posting.doc_id);

        varint::write_u32(buf, delta);
        encode_positions(buf, posting)?;
    }

    Ok(())
}

fn encode_positions(buf: &mut BytesMut, posting: &Posting) -> Result<(), IndexError> {
    let invalid = |reason| IndexError::InvalidPosting {
        doc_id: posting.doc_id,
        reason,
    };

    if posting.positions.is_empty() {
        return Err(invalid("empty position list"));
    }
    let count =
        u32::try_from(posting.positions.len()).map_err(|_| invalid("too many positions"))?;
    buf.reserve(varint::encoded_len(count) + posting.positions.len() * varint::MAX_LEN);
    varint::write_u32(buf, count);

    let mut prev: Option<Position> = None;
    for &pos in &posting.positions {
        let delta = match prev {
            None => pos,
            Some(p) if pos > p => pos - p,
            Some(_) => return Err(invalid("positions not strictly ascending")),
        };
        prev = Some(pos);
        varint::write_u32(buf, delta);
    }

    Ok(())
}

/// Decode a whole index shard, checking every ordering invariant.
pub fn decode_shard(data: &[u8]) -> Result<Vec<TermPostings>, IndexError> {
    let mut cursor = data;
    let mut out: Vec<TermPostings> = Vec::new();

    while !cursor.is_empty() {
        let entry = decode_term(&mut cursor)?;
        if let Some(prev) = out.last() {
            if prev.term.as_bytes() >= entry.term.as_bytes() {
                return Err(IndexError::Corrupt(format!(
                    "term {:?} does not sort after {:?}",
                    entry.term, prev.term
                )));
            }
        }
        out.push(entry);
    }

    Ok(out)
}

/// Decode and return the postings of `term`, if the shard holds it.
pub fn find_term(data: &[u8], term: &str) -> Result<Option<Vec<Posting>>, IndexError> {
    Ok(decode_shard(data)?
        .into_iter()
        .find(|entry| entry.term == term)
        .map(|entry| entry.postings))
}

fn decode_term(cursor: &mut &[u8]) -> Result<TermPostings, IndexError> {
    let term_len = cursor.read_u8().map_err(truncated)? as usize;
    if cursor.len() < term_len {
        return Err(IndexError::Corrupt("truncated term".to_string()));
    }
    let bytes: &[u8] = *cursor;
    let (term_bytes, rest) = bytes.split_at(term_len);
    *cursor = rest;
    let term = String::from_utf8(term_bytes.to_vec())
        .map_err(|e| IndexError::Corrupt(format!("term is not UTF-8: {}", e)))?;

    let count = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
    let mut postings = Vec::with_capacity(count.min(1 << 16) as usize);
    let mut doc_id: DocId = 0;

    for i in 0..count {
        let delta = varint::read_u32(cursor).map_err(truncated)?;
        if i > 0 && delta == 0 {
            return Err(IndexError::Corrupt(format!(
                "duplicate doc {} under {:?}",
                doc_id, term
            )));
        }
        doc_id = doc_id
            .checked_add(delta)
            .ok_or_else(|| IndexError::Corrupt("doc id overflow".to_string()))?;

        let positions = decode_positions(cursor, doc_id)?;
        postings.push(Posting::new(doc_id, positions));
    }

    Ok(TermPostings { term, postings })
}

fn decode_positions(cursor: &mut &[u8], doc_id: DocId) -> Result<Vec<Position>, IndexError> {
    let count = varint::read_u32(cursor).map_err(truncated)?;
    if count == 0 {
        return Err(IndexError::Corrupt(format!("doc {} has no positions", doc_id)));
    }

    let mut positions = Vec::with_capacity(count.min(1 << 16) as usize);
    let mut pos: Position = 0;
    for i in 0..count {
        let delta = varint::read_u32(cursor).map_err(truncated)?;
        if i > 0 && delta == 0 {
            return Err(IndexError::Corrupt(format!(
                "repeated position in doc {}",
                doc_id
            )));
        }
        pos = pos
            .checked_add(delta)
            .ok_or_else(|| IndexError::Corrupt("position overflow".to_string()))?;
        positions.push(pos);
    }

    Ok(positions)
}

fn truncated(e: std::io::Error) -> IndexError {
    IndexError::Corrupt(format!("truncated postings: {}", e))
}
