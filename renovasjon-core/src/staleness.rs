//! Staleness rules for a cached entry list.

use chrono::NaiveDate;

use crate::model::Entry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Tunables for [`is_stale`].
pub struct StalenessPolicy {
    /// Treat a list without entries as stale.
    ///
    /// Off by default: an empty list has nothing that could be outdated.
    pub empty_is_stale: bool,
}

/// Decide whether the entry list has to be fetched again.
///
/// The list is stale as soon as one entry lacks a pickup date or has a pickup on a
/// day before `today`.
#[must_use]
pub fn is_stale(entries: &[Entry], today: NaiveDate, policy: StalenessPolicy) -> bool {
    if entries.is_empty() {
        return policy.empty_is_stale;
    }

    entries.iter().any(|entry| entry_is_stale(entry, today))
}

/// Staleness of a single entry, see [`is_stale`].
#[must_use]
pub fn entry_is_stale(entry: &Entry, today: NaiveDate) -> bool {
    match (entry.first_pickup, entry.next_pickup) {
        (Some(first), Some(next)) => first.date() < today || next.date() < today,
        _ => true,
    }
}
