// src/pipeline/merge.rs

//! Merging a run's result into the two stored documents.
//!
//! Both documents only ever grow at index 0; existing items are never
//! reordered or rewritten.

use chrono::{DateTime, Utc};

use crate::models::{FeedDocument, FeedItem, RawSourceEntry};

/// Record `entry` as offered to the flow, stamped with `now`.
pub fn record_offered(ledger: &mut FeedDocument, entry: &RawSourceEntry, now: DateTime<Utc>) -> bool {
    let added = ledger.prepend(entry.to_ledger_item(now));
    if added {
        ledger.touch(now);
    }
    added
}

/// Publish an accepted item. Returns `false` when its guid is already present.
pub fn publish(public: &mut FeedDocument, item: FeedItem, now: DateTime<Utc>) -> bool {
    let added = public.prepend(item);
    if added {
        public.touch(now);
    }
    added
}
