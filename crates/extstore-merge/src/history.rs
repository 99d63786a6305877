//! Per-security merge rule.
//!
//! Given the old and new histories of one security:
//!
//! 1. If both are non-empty, find the latest date present in both. Old
//!    records strictly before it are kept; new records on or after it are
//!    appended. Old records after that date are discarded even when the new
//!    side has no record for them.
//! 2. If the two share no date, the new history replaces the old one.
//! 3. If only one side has records, that side is used as is.
//!
//! The result is then stably sorted by date, reduced to one record per date
//! (the last one wins, so new beats old), and cut to the most recent
//! `window` records.

use std::collections::HashSet;

use extstore_error::{ExtError, Result};
use extstore_types::DatRecord;
use serde::Serialize;
use tracing::{debug, warn};

/// How a security's merged history was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MergeOutcome {
    /// Neither side had records.
    Empty,
    OldOnly,
    NewOnly,
    /// Spliced at the latest common date.
    Spliced { boundary: u32 },
    /// No common date; the new history was taken alone.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityMerge {
    pub records: Vec<DatRecord>,
    pub outcome: MergeOutcome,
    /// Records were dropped to respect the retention window.
    pub truncated: bool,
}

/// Latest date present on both sides.
#[must_use]
pub fn max_common_date(old: &[DatRecord], new: &[DatRecord]) -> Option<u32> {
    let old_dates: HashSet<u32> = old.iter().map(|record| record.date).collect();
    new.iter()
        .map(|record| record.date)
        .filter(|date| old_dates.contains(date))
        .max()
}

/// Splice `old` and `new` at their latest common date.
///
/// Fails with [`ExtError::NoOverlap`] when the two share no date.
pub fn splice_at_common_date(
    security_code: &str,
    old: &[DatRecord],
    new: &[DatRecord],
) -> Result<(Vec<DatRecord>, u32)> {
    let boundary = max_common_date(old, new).ok_or_else(|| ExtError::NoOverlap {
        security_code: security_code.to_owned(),
    })?;
    let spliced = old
        .iter()
        .filter(|record| record.date < boundary)
        .chain(new.iter().filter(|record| record.date >= boundary))
        .copied()
        .collect();
    Ok((spliced, boundary))
}

/// Stable sort by date, keep the last record per date, keep the newest
/// `window`. Returns whether the window dropped anything.
pub fn normalize(records: &mut Vec<DatRecord>, window: usize) -> bool {
    records.sort_by_key(|record| record.date);
    let mut deduped: Vec<DatRecord> = Vec::with_capacity(records.len());
    for &record in records.iter() {
        match deduped.last_mut() {
            Some(last) if last.date == record.date => *last = record,
            _ => deduped.push(record),
        }
    }
    let excess = deduped.len().saturating_sub(window);
    deduped.drain(..excess);
    *records = deduped;
    excess > 0
}

/// Merge one security's histories. Never fails: a missing overlap is
/// logged and resolved by taking the new history.
#[must_use]
pub fn merge_security(
    security_code: &str,
    old: &[DatRecord],
    new: &[DatRecord],
    window: usize,
) -> SecurityMerge {
    let (mut records, outcome) = match (old.is_empty(), new.is_empty()) {
        (true, true) => (Vec::new(), MergeOutcome::Empty),
        (false, true) => (old.to_vec(), MergeOutcome::OldOnly),
        (true, false) => (new.to_vec(), MergeOutcome::NewOnly),
        (false, false) => match splice_at_common_date(security_code, old, new) {
            Ok((spliced, boundary)) => (spliced, MergeOutcome::Spliced { boundary }),
            Err(err) => {
                warn!(
                    security_code,
                    old_records = old.len(),
                    new_records = new.len(),
                    error = %err,
                    "no common date; keeping new history only"
                );
                (new.to_vec(), MergeOutcome::Fallback)
            }
        },
    };
    let truncated = normalize(&mut records, window);
    debug!(
        security_code,
        ?outcome,
        records = records.len(),
        truncated,
        "security merged"
    );
    SecurityMerge {
        records,
        outcome,
        truncated,
    }
}

/// Check a merged history: strictly increasing dates, at most `window`
/// records.
pub fn check_history(security_code: &str, records: &[DatRecord], window: usize) -> Result<()> {
    if records.len() > window {
        return Err(ExtError::inconsistent(format!(
            "{security_code}: {} records exceed retention window {window}",
            records.len()
        )));
    }
    if let Some(pair) = records.windows(2).find(|pair| pair[0].date >= pair[1].date) {
        return Err(ExtError::inconsistent(format!(
            "{security_code}: date {} not after {}",
            pair[1].date, pair[0].date
        )));
    }
    Ok(())
}
