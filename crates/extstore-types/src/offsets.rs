//! Cumulative record offsets derived from an IDX listing.
//!
//! A DAT file stores each security's block back to back in IDX order, so the
//! first record of entry `i` sits at the sum of the counts of entries
//! `0..i`. Offsets are recomputed on every open and never written to disk.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::record::IdxRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetEntry {
    pub security_code: String,
    pub market_code: u16,
    pub record_count: u32,
    /// Index (in records, not bytes) of this security's first DAT record.
    pub start_offset: u64,
}

impl OffsetEntry {
    /// One past the last record index of this block.
    #[must_use]
    pub const fn end_offset(&self) -> u64 {
        self.start_offset + self.record_count as u64
    }
}

/// Offsets for one IDX file, in file order.
///
/// Lookup by code returns the first entry carrying that code. A code listed
/// twice is not merged: the later entry still occupies its DAT block (and
/// shifts every following offset) but cannot be reached through [`get`].
///
/// [`get`]: OffsetIndex::get
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    entries: Vec<OffsetEntry>,
    first_by_code: HashMap<String, usize>,
    shadowed: Vec<usize>,
}

impl OffsetIndex {
    #[must_use]
    pub fn entries(&self) -> &[OffsetEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, security_code: &str) -> Option<&OffsetEntry> {
        self.first_by_code
            .get(security_code)
            .map(|&position| &self.entries[position])
    }

    #[must_use]
    pub fn contains(&self, security_code: &str) -> bool {
        self.first_by_code.contains_key(security_code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every entry's record count, duplicates included.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.entries.last().map_or(0, OffsetEntry::end_offset)
    }

    /// Entries hidden behind an earlier entry with the same code.
    pub fn shadowed(&self) -> impl Iterator<Item = &OffsetEntry> {
        self.shadowed.iter().map(|&position| &self.entries[position])
    }

    /// Distinct codes in first-occurrence order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(position, entry)| self.first_by_code.get(&entry.security_code) == Some(position))
            .map(|(_, entry)| entry.security_code.as_str())
    }
}

/// Exclusive prefix sum of `record_count` in IDX order.
#[must_use]
pub fn build_offsets(records: &[IdxRecord]) -> OffsetIndex {
    let mut index = OffsetIndex {
        entries: Vec::with_capacity(records.len()),
        first_by_code: HashMap::with_capacity(records.len()),
        shadowed: Vec::new(),
    };
    let mut running = 0u64;
    for (position, record) in records.iter().enumerate() {
        index.entries.push(OffsetEntry {
            security_code: record.security_code.clone(),
            market_code: record.market_code,
            record_count: record.record_count,
            start_offset: running,
        });
        running += u64::from(record.record_count);

        if index.first_by_code.contains_key(&record.security_code) {
            warn!(
                security_code = %record.security_code,
                position,
                "duplicate security code in IDX; later entry is unreachable by code"
            );
            index.shadowed.push(position);
        } else {
            index
                .first_by_code
                .insert(record.security_code.clone(), position);
        }
    }
    index
}
