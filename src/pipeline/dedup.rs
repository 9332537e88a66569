// src/pipeline/dedup.rs

//! Identity-based deduplication of the source feed against the ledger.

use std::collections::HashSet;

use crate::models::{FeedDocument, RawSourceEntry};

/// Source entries whose id is absent from `ledger`, in source order.
///
/// An id repeated within the source batch is kept once, at its first position.
pub fn new_entries<'a>(ledger: &FeedDocument, source: &'a [RawSourceEntry]) -> Vec<&'a RawSourceEntry> {
    let known = ledger.guids();
    let mut seen = HashSet::new();

    source
        .iter()
        .filter(|entry| !known.contains(entry.id.as_str()))
        .filter(|entry| seen.insert(entry.id.as_str()))
        .collect()
}
