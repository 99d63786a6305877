//! File I/O for extended-data stores.
//!
//! - [`sequential`]: scan or rewrite a whole record file.
//! - [`random_access`]: read a window of records by index.
//! - [`staged`]: build a replacement file next to its destination.
//! - [`patch`]: overwrite fields of existing INFO records in place.
//! - [`store`]: an opened IDX + DAT pair with lookups by code and date.

pub mod patch;
pub mod random_access;
pub mod sequential;
pub mod staged;
pub mod store;

pub use patch::{patch_records, set_period, stamp_generation};
pub use random_access::{RangeReader, read_range};
pub use sequential::{RecordFile, RecordIter, read_all, write_all, write_records};
pub use staged::{StagedFile, commit_pair};
pub use store::{CrossSectionRow, StoreReader};
