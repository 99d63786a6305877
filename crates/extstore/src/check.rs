//! Consistency report for an IDX + DAT pair.

use std::path::Path;

use extstore_error::Result;
use extstore_io::{RecordFile, StoreReader, read_all};
use extstore_types::{DatRecord, IdxRecord, build_offsets, check_layouts};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCheck {
    pub securities: usize,
    /// Sum of IDX record counts.
    pub declared_records: u64,
    /// Complete records in the DAT file.
    pub dat_records: u64,
    /// Codes listed more than once; later listings are unreachable.
    pub duplicate_codes: Vec<String>,
    /// Codes whose dates are not strictly increasing.
    pub unordered_codes: Vec<String>,
    /// Codes holding more records than `window`, when one was given.
    pub oversized_codes: Vec<String>,
}

impl StoreCheck {
    #[must_use]
    pub fn totals_match(&self) -> bool {
        self.declared_records == self.dat_records
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.totals_match()
            && self.duplicate_codes.is_empty()
            && self.unordered_codes.is_empty()
            && self.oversized_codes.is_empty()
    }
}

/// Inspect a store without modifying it.
///
/// Mismatched totals are reported rather than returned as an error; the
/// per-security checks are skipped in that case.
pub fn check_store(
    idx_path: impl AsRef<Path>,
    dat_path: impl AsRef<Path>,
    window: Option<usize>,
) -> Result<StoreCheck> {
    check_layouts()?;
    let idx_path = idx_path.as_ref();
    let dat_path = dat_path.as_ref();
    let idx = read_all::<IdxRecord>(idx_path)?;
    let offsets = build_offsets(&idx);

    let mut report = StoreCheck {
        securities: offsets.codes().count(),
        declared_records: offsets.total_records(),
        dat_records: RecordFile::<DatRecord>::open(dat_path)?.record_count()?,
        duplicate_codes: offsets
            .shadowed()
            .map(|entry| entry.security_code.clone())
            .collect(),
        ..StoreCheck::default()
    };
    if !report.totals_match() {
        warn!(
            idx = %idx_path.display(),
            declared = report.declared_records,
            present = report.dat_records,
            "IDX and DAT totals disagree"
        );
        return Ok(report);
    }

    let mut store = StoreReader::open(idx_path, dat_path)?;
    let codes: Vec<String> = offsets.codes().map(str::to_owned).collect();
    for code in codes {
        let records = store.history(&code)?.unwrap_or_default();
        if records.windows(2).any(|pair| pair[0].date >= pair[1].date) {
            report.unordered_codes.push(code.clone());
        }
        if window.is_some_and(|window| records.len() > window) {
            report.oversized_codes.push(code);
        }
    }
    info!(
        idx = %idx_path.display(),
        securities = report.securities,
        clean = report.is_clean(),
        "store checked"
    );
    Ok(report)
}
