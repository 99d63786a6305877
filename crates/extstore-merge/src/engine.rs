//! Whole-store incremental merge.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use extstore_error::{ExtError, Result};
use extstore_io::{StagedFile, StoreReader, commit_pair};
use extstore_types::{IdxRecord, check_layouts};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::history::{MergeOutcome, check_history, merge_security};

pub const DEFAULT_RETENTION_WINDOW: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeOptions {
    /// Most recent records kept per security.
    pub retention_window: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            retention_window: DEFAULT_RETENTION_WINDOW,
        }
    }
}

impl MergeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.retention_window == 0 {
            return Err(ExtError::config("retention_window must be at least 1"));
        }
        Ok(())
    }
}

/// Paths of one IDX + DAT pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub idx: PathBuf,
    pub dat: PathBuf,
}

impl StorePaths {
    pub fn new(idx: impl Into<PathBuf>, dat: impl Into<PathBuf>) -> Self {
        Self {
            idx: idx.into(),
            dat: dat.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Distinct codes written.
    pub securities: usize,
    pub old_only: usize,
    pub new_only: usize,
    pub overlapping: usize,
    /// Codes whose histories shared no date and were replaced.
    pub fallbacks: Vec<String>,
    /// Securities that lost records to the retention window.
    pub truncated: usize,
    pub total_records: u64,
}

/// Merge `old` with `new` into `output`.
///
/// Output is written in ascending code order, staged beside the
/// destinations, verified, and only then renamed over them. On any error the
/// destination files are left as they were. `output` may name the `old`
/// files.
pub fn merge_stores(
    old: &StorePaths,
    new: &StorePaths,
    output: &StorePaths,
    options: &MergeOptions,
) -> Result<MergeReport> {
    check_layouts()?;
    options.validate()?;
    let window = options.retention_window;

    let mut old_store = StoreReader::open(&old.idx, &old.dat)?;
    let mut new_store = StoreReader::open(&new.idx, &new.dat)?;

    let all_codes: BTreeSet<String> = old_store
        .offsets()
        .codes()
        .chain(new_store.offsets().codes())
        .map(str::to_owned)
        .collect();

    let mut dat_out = StagedFile::create(&output.dat)?;
    let mut idx_records = Vec::with_capacity(all_codes.len());
    let mut report = MergeReport::default();

    for code in &all_codes {
        let market_code = old_store
            .offsets()
            .get(code)
            .or_else(|| new_store.offsets().get(code))
            .map(|entry| entry.market_code)
            .ok_or_else(|| ExtError::internal(format!("{code} vanished from both IDX files")))?;

        let old_records = old_store.history(code)?.unwrap_or_default();
        let new_records = new_store.history(code)?.unwrap_or_default();
        let merged = merge_security(code, &old_records, &new_records, window);
        check_history(code, &merged.records, window)?;

        match merged.outcome {
            MergeOutcome::OldOnly => report.old_only += 1,
            MergeOutcome::NewOnly => report.new_only += 1,
            MergeOutcome::Spliced { .. } => report.overlapping += 1,
            MergeOutcome::Fallback => {
                report.overlapping += 1;
                report.fallbacks.push(code.clone());
            }
            MergeOutcome::Empty => {}
        }
        if merged.truncated {
            report.truncated += 1;
        }

        let count = u32::try_from(merged.records.len())
            .map_err(|_| ExtError::internal(format!("{code}: record count overflows u32")))?;
        dat_out.append_all(&merged.records)?;
        idx_records.push(IdxRecord::new(market_code, code.as_str(), count));
        report.total_records += u64::from(count);
    }
    report.securities = idx_records.len();

    if report.total_records != dat_out.records_written() {
        return Err(ExtError::inconsistent(format!(
            "IDX counts sum to {}, staged DAT holds {}",
            report.total_records,
            dat_out.records_written()
        )));
    }

    let mut idx_out = StagedFile::create(&output.idx)?;
    idx_out.append_all(&idx_records)?;

    // release the input handles before renaming over them
    drop(old_store);
    drop(new_store);
    commit_pair(dat_out, idx_out)?;

    if !report.fallbacks.is_empty() {
        warn!(
            count = report.fallbacks.len(),
            codes = ?report.fallbacks,
            "securities replaced without a common date"
        );
    }
    info!(
        idx = %output.idx.display(),
        dat = %output.dat.display(),
        securities = report.securities,
        old_only = report.old_only,
        new_only = report.new_only,
        overlapping = report.overlapping,
        truncated = report.truncated,
        records = report.total_records,
        "stores merged"
    );
    Ok(report)
}

/// [`merge_stores`] taking the six paths directly.
pub fn merge_store_files(
    old_idx: impl AsRef<Path>,
    old_dat: impl AsRef<Path>,
    new_idx: impl AsRef<Path>,
    new_dat: impl AsRef<Path>,
    out_idx: impl AsRef<Path>,
    out_dat: impl AsRef<Path>,
    options: &MergeOptions,
) -> Result<MergeReport> {
    merge_stores(
        &StorePaths::new(old_idx.as_ref(), old_dat.as_ref()),
        &StorePaths::new(new_idx.as_ref(), new_dat.as_ref()),
        &StorePaths::new(out_idx.as_ref(), out_dat.as_ref()),
        options,
    )
}
