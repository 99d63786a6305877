//! Incremental merge of extended-data stores.
//!
//! [`merge_stores`] folds a new IDX + DAT pair into an old one, security by
//! security, using the rule documented in [`history`]. [`series`] applies
//! the same rule to flat single-series files and carries a few series
//! utilities.

pub mod engine;
pub mod history;
pub mod series;

pub use engine::{
    DEFAULT_RETENTION_WINDOW, MergeOptions, MergeReport, StorePaths, merge_store_files,
    merge_stores,
};
pub use history::{MergeOutcome, SecurityMerge, max_common_date, merge_security};
pub use series::{
    SeriesComparison, SeriesMergeSummary, ValueMismatch, compare_series, merge_series_file,
    replace_recent, sum_by_date,
};
