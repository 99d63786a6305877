//! Extended-data stores: fixed-width INFO, IDX and DAT files holding per-security
//! date/time/value series.
//!
//! This crate gathers the workspace into one API and adds configuration,
//! logging setup and [`check_store`].
//!
//! ```no_run
//! use extstore::{MergeOptions, StorePaths, StoreReader, merge_stores};
//!
//! # fn main() -> extstore::Result<()> {
//! let mut store = StoreReader::open("extdata_1.idx", "extdata_1.dat")?;
//! if let Some(history) = store.history("600000")? {
//!     println!("{} records", history.len());
//! }
//!
//! merge_stores(
//!     &StorePaths::new("extdata_1.idx", "extdata_1.dat"),
//!     &StorePaths::new("incoming.idx", "incoming.dat"),
//!     &StorePaths::new("extdata_1.idx", "extdata_1.dat"),
//!     &MergeOptions::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod config;
pub mod logging;

pub use check::{StoreCheck, check_store};
pub use config::{LoggingConfig, StoreConfig};
pub use extstore_error::{ExtError, Result};
pub use extstore_io::{
    CrossSectionRow, RangeReader, RecordFile, StagedFile, StoreReader, patch_records, read_all,
    read_range, set_period, stamp_generation, write_all,
};
pub use extstore_merge::{
    DEFAULT_RETENTION_WINDOW, MergeOptions, MergeOutcome, MergeReport, SeriesComparison,
    SeriesMergeSummary, StorePaths, compare_series, merge_security, merge_series_file,
    merge_store_files, merge_stores, replace_recent, sum_by_date,
};
pub use extstore_types::{
    DAT_RECORD_SIZE, DatRecord, FieldLayout, FieldValue, FixedRecord, IDX_RECORD_SIZE,
    INFO_GENERATION_DATE_OFFSET, INFO_PERIOD_START_OFFSET, INFO_RECORD_SIZE, IdxRecord,
    InfoRecord, OffsetEntry, OffsetIndex, ScalarKind, build_offsets, latest_generation_date,
    market_name,
};
