//! Single-series helpers: flat DAT files with no IDX.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use extstore_error::Result;
use extstore_io::{StagedFile, read_all};
use extstore_types::DatRecord;
use serde::Serialize;
use tracing::info;

use crate::engine::MergeOptions;
use crate::history::{MergeOutcome, check_history, merge_security};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesMergeSummary {
    pub outcome: MergeOutcome,
    pub truncated: bool,
    pub records: u64,
}

/// Merge `incoming` into the series stored at `existing_dat` and write the
/// result to `output_dat` (which may be the same file).
///
/// Uses the per-security rule of [`merge_security`]; the existing file must
/// exist.
pub fn merge_series_file(
    existing_dat: impl AsRef<Path>,
    incoming: &[DatRecord],
    output_dat: impl AsRef<Path>,
    options: &MergeOptions,
) -> Result<SeriesMergeSummary> {
    options.validate()?;
    let existing_dat = existing_dat.as_ref();
    let output_dat = output_dat.as_ref();
    let existing = read_all::<DatRecord>(existing_dat)?;

    let label = existing_dat.display().to_string();
    let merged = merge_security(&label, &existing, incoming, options.retention_window);
    check_history(&label, &merged.records, options.retention_window)?;

    let mut staged = StagedFile::create(output_dat)?;
    staged.append_all(&merged.records)?;
    let records = staged.records_written();
    staged.commit()?;

    info!(
        existing = %existing_dat.display(),
        output = %output_dat.display(),
        outcome = ?merged.outcome,
        records,
        "series merged"
    );
    Ok(SeriesMergeSummary {
        outcome: merged.outcome,
        truncated: merged.truncated,
        records,
    })
}

/// Collapse to one record per date whose value is the sum of that date's
/// values. Times are reset to zero; dates ascend.
#[must_use]
pub fn sum_by_date(records: &[DatRecord]) -> Vec<DatRecord> {
    let mut totals: BTreeMap<u32, f32> = BTreeMap::new();
    for record in records {
        *totals.entry(record.date).or_default() += record.value;
    }
    totals
        .into_iter()
        .map(|(date, value)| DatRecord::daily(date, value))
        .collect()
}

/// Overwrite the tail of a series.
///
/// Takes the last `take_last` incoming records, drops existing records on
/// their dates, appends them, sorts by date and keeps the last `keep_last`.
#[must_use]
pub fn replace_recent(
    existing: &[DatRecord],
    incoming: &[DatRecord],
    take_last: usize,
    keep_last: usize,
) -> Vec<DatRecord> {
    let fresh = &incoming[incoming.len().saturating_sub(take_last)..];
    let replaced: HashSet<u32> = fresh.iter().map(|record| record.date).collect();
    let mut out: Vec<DatRecord> = existing
        .iter()
        .filter(|record| !replaced.contains(&record.date))
        .chain(fresh)
        .copied()
        .collect();
    out.sort_by_key(|record| record.date);
    let excess = out.len().saturating_sub(keep_last);
    out.drain(..excess);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueMismatch {
    pub date: u32,
    pub left: f32,
    pub right: f32,
}

/// Outcome of joining two series on date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesComparison {
    pub overlapping: usize,
    pub equal: usize,
    pub different: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub mismatches: Vec<ValueMismatch>,
}

impl SeriesComparison {
    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.different == 0 && self.left_only == 0 && self.right_only == 0
    }
}

/// Compare two series date by date. Values are equal when
/// `|left - right| <= tolerance * (1 + |right|)`. For dates repeated within
/// one series the last record counts.
#[must_use]
pub fn compare_series(left: &[DatRecord], right: &[DatRecord], tolerance: f32) -> SeriesComparison {
    let by_date = |records: &[DatRecord]| -> BTreeMap<u32, f32> {
        records
            .iter()
            .map(|record| (record.date, record.value))
            .collect()
    };
    let left = by_date(left);
    let right = by_date(right);

    let mut out = SeriesComparison::default();
    for (&date, &a) in &left {
        let Some(&b) = right.get(&date) else {
            out.left_only += 1;
            continue;
        };
        out.overlapping += 1;
        if (a - b).abs() <= tolerance * (1.0 + b.abs()) {
            out.equal += 1;
        } else {
            out.different += 1;
            out.mismatches.push(ValueMismatch {
                date,
                left: a,
                right: b,
            });
        }
    }
    out.right_only = right.keys().filter(|date| !left.contains_key(date)).count();
    out
}
