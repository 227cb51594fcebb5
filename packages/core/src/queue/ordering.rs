//! Pure queue-ordering functions.
//!
//! `rank_pending` is the single source of truth for position indices: the
//! mutating paths persist its output, and the read path applies it in memory
//! so a stale stored index is never surfaced.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::queue::types::{QueueItem, QueueStatus};

/// Ordering key for queue items. `created_at` breaks `arrival_date` ties;
/// row id breaks same-instant inserts (insertion order).
fn sort_key(item: &QueueItem) -> (DateTime<Utc>, DateTime<Utc>, i64) {
    (item.arrival_date, item.created_at, item.id)
}

/// Derive the dense 0-based rank of every `PENDING` item.
///
/// Opened items are ignored entirely — they keep whatever index they froze
/// at. The returned map contains exactly one entry per pending item, with
/// values `0..N-1` in `(arrival_date, created_at)` order.
pub fn rank_pending(items: &[QueueItem]) -> HashMap<i64, i64> {
    let mut pending: Vec<&QueueItem> = items
        .iter()
        .filter(|item| item.status == QueueStatus::Pending)
        .collect();
    pending.sort_by_key(|item| sort_key(item));

    pending
        .iter()
        .enumerate()
        .map(|(rank, item)| (item.id, rank as i64))
        .collect()
}

/// Number of pending items whose `arrival_date` is strictly earlier than the
/// candidate's. This is the "ahead count" reported in the enqueue
/// notification; same-instant arrivals do not count as ahead.
pub fn ahead_count(items: &[QueueItem], candidate: &QueueItem) -> i64 {
    items
        .iter()
        .filter(|item| {
            item.status == QueueStatus::Pending
                && item.id != candidate.id
                && item.arrival_date < candidate.arrival_date
        })
        .count() as i64
}

/// Sort items for display, pending and opened alike, by the queue key.
pub fn sort_for_display(items: &mut [QueueItem]) {
    items.sort_by_key(|item| sort_key(item));
}
