//! Lexical components: tokenizer and the sharded in-memory inverted index.

use crate::partition::term_shard;
use crate::types::{DocId, Position, Posting, SHARD_COUNT};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Longest term the postings format can carry (one length byte).
pub const MAX_TERM_LEN: usize = u8::MAX as usize;

/// Maximal runs of letters (`L*`) and decimal digits (`Nd`).
static TERM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{Nd}]+").expect("term pattern compiles"));

/// Tokenize text into terms.
///
/// Finds maximal runs of letters and decimal digits in the original text,
/// then lowercases each run. Everything else is a boundary and is dropped.
/// A term's index in the returned vector is its position.
pub fn tokenize(text: &str) -> Vec<String> {
    TERM_RUN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// One document's terms with their positions.
#[derive(Debug, Default)]
pub struct GroupedTerms {
    /// Term -> strictly ascending positions.
    pub terms: HashMap<String, Vec<Position>>,
    /// Tokens longer than [`MAX_TERM_LEN`] bytes, left out of `terms`.
    pub skipped: usize,
}

/// Group a token sequence by term.
///
/// Over-long tokens are dropped but still consume their position, so the
/// positions of every other term are unaffected.
pub fn group_positions(tokens: Vec<String>) -> GroupedTerms {
    let mut grouped = GroupedTerms::default();

    for (pos, token) in tokens.into_iter().enumerate() {
        if token.len() > MAX_TERM_LEN {
            grouped.skipped += 1;
            continue;
        }
        grouped
            .terms
            .entry(token)
            .or_default()
            .push(pos as Position);
    }

    grouped
}

/// Per-shard term -> posting list map.
pub type ShardPostings = HashMap<String, Vec<Posting>>;

/// Accumulates postings for every index shard during the streaming pass.
///
/// Postings are appended in arrival order; sorting happens at encode time.
pub struct IndexAccumulator {
    /// One map per index shard.
    shards: Vec<ShardPostings>,
    /// Total postings held.
    posting_count: u64,
}

impl IndexAccumulator {
    /// Create an empty accumulator with [`SHARD_COUNT`] shards.
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| HashMap::new()).collect(),
            posting_count: 0,
        }
    }

    /// Tokenize `text` and add one posting per distinct term.
    ///
    /// Returns how many tokens were too long to index.
    pub fn add_document(&mut self, doc_id: DocId, text: &str) -> usize {
        let grouped = group_positions(tokenize(text));

        for (term, positions) in grouped.terms {
            let shard = term_shard(&term) as usize;
            self.shards[shard]
                .entry(term)
                .or_default()
                .push(Posting::new(doc_id, positions));
            self.posting_count += 1;
        }

        grouped.skipped
    }

    /// Fold another accumulator's postings into this one.
    ///
    /// Concatenation only. Since the encoder sorts, the order in which
    /// partial accumulators are merged does not change the encoded output.
    pub fn merge(&mut self, other: IndexAccumulator) {
        for (mine, theirs) in self.shards.iter_mut().zip(other.shards) {
            for (term, mut postings) in theirs {
                mine.entry(term).or_default().append(&mut postings);
            }
        }
        self.posting_count += other.posting_count;
    }

    /// Postings held by one shard.
    pub fn shard(&self, shard: u32) -> &ShardPostings {
        &self.shards[shard as usize]
    }

    /// Total postings held.
    pub fn posting_count(&self) -> u64 {
        self.posting_count
    }

    /// Number of shards holding at least one term.
    pub fn non_empty_shards(&self) -> usize {
        self.shards.iter().filter(|s| !s.is_empty()).count()
    }

    /// Consume into `(shard number, postings)` for every non-empty shard,
    /// in ascending shard order.
    pub fn into_shards(self) -> impl Iterator<Item = (u32, ShardPostings)> {
        self.shards
            .into_iter()
            .enumerate()
            .filter(|(_, shard)| !shard.is_empty())
            .map(|(i, shard)| (i as u32, shard))
    }
}

impl Default for IndexAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
