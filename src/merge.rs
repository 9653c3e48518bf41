// Merge policies: does a newly observed record change what a source stores?

use chrono::TimeDelta;

use crate::record::NetworkRecord;

/// Timestamps closer than this are treated as the same event.
pub const TIMESTAMP_TOLERANCE: TimeDelta = TimeDelta::seconds(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Live sources: any difference in what NetworkManager or the device
    /// would actually use gets pushed.
    Strict,
    /// The JSON store: absorbs timestamp precision loss and keeps history
    /// the incoming record does not know about.
    Tolerant,
}

impl MergePolicy {
    /// Returns the record to install in place of `old`, or `None` when `new`
    /// changes nothing.
    pub fn with_update_applied(
        &self,
        old: &NetworkRecord,
        new: &NetworkRecord,
    ) -> Option<NetworkRecord> {
        match self {
            MergePolicy::Strict => strict_update(old, new),
            MergePolicy::Tolerant => tolerant_update(old, new),
        }
    }
}

pub fn strict_update(old: &NetworkRecord, new: &NetworkRecord) -> Option<NetworkRecord> {
    let unchanged = old.ssid() == new.ssid()
        && old.security() == new.security()
        && old.credential() == new.credential()
        && old.autoconnect() == new.autoconnect();

    if unchanged { None } else { Some(new.clone()) }
}

pub fn tolerant_update(old: &NetworkRecord, new: &NetworkRecord) -> Option<NetworkRecord> {
    let mut merged = new.clone();

    // Only a clearly earlier creation time replaces the stored one.
    if old.created_at() - merged.created_at() <= TIMESTAMP_TOLERANCE {
        merged.set_created_at(old.created_at());
    }

    // Only a clearly later sighting replaces the stored one.
    let keep_old_last_seen = match (merged.last_seen_at(), old.last_seen_at()) {
        (None, _) => true,
        (Some(new_seen), Some(old_seen)) => new_seen - old_seen <= TIMESTAMP_TOLERANCE,
        (Some(_), None) => false,
    };
    if keep_old_last_seen {
        merged.set_last_seen_at(old.last_seen_at());
    }

    if merged.comment().is_none() {
        merged.set_comment(old.comment().map(str::to_string));
    }

    // Live sources have no notion of sync exclusion; the stored flag wins.
    merged.set_sync(old.sync());

    let unchanged = old.name() == merged.name()
        && old.ssid() == merged.ssid()
        && old.security() == merged.security()
        && old.credential() == merged.credential()
        && old.autoconnect() == merged.autoconnect()
        && old.created_at() == merged.created_at()
        && old.last_seen_at() == merged.last_seen_at()
        && old.comment() == merged.comment();

    if unchanged { None } else { Some(merged) }
}
