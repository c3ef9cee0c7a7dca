//! Deterministic shard assignment for terms and documents.
//!
//! Both functions are pure and total, so a rebuild from identical input
//! lands every term and document in the same shard file.

use crate::types::{DocId, DOC_SHARD_COUNT, SHARD_COUNT};

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over raw bytes. Unseeded, so stable across processes.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV32_OFFSET_BASIS, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(FNV32_PRIME)
    })
}

/// Index shard that owns `term`.
pub fn term_shard(term: &str) -> u32 {
    fnv1a32(term.as_bytes()) % SHARD_COUNT
}

/// Document shard that owns document `id`.
pub fn doc_shard(id: DocId) -> u32 {
    id % DOC_SHARD_COUNT
}
