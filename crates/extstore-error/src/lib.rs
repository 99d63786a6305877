//! Error taxonomy for the extended-data store.
//!
//! Every crate in the workspace returns [`Result<T>`]. Variants fall into two
//! groups:
//! - recoverable, contained by the caller and logged: [`ExtError::TruncatedRecord`],
//!   [`ExtError::NoOverlap`]
//! - fatal for the operation that raised them: everything else
//!
//! Cross-file consistency failures ([`ExtError::InconsistentTotals`]) always
//! abort before any output is produced.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared result alias.
pub type Result<T, E = ExtError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ExtError {
    /// A record's declared field table does not add up to its fixed size.
    #[error("{record} layout mismatch: declared {declared} bytes, fields sum to {computed}")]
    LayoutMismatch {
        record: &'static str,
        declared: usize,
        computed: usize,
    },

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes than one fixed-size record were available.
    #[error("truncated {record} record: need {expected} bytes, got {actual}")]
    TruncatedRecord {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("field {field} too long: {actual} bytes exceeds width {width}")]
    FieldTooLong {
        field: &'static str,
        width: usize,
        actual: usize,
    },

    #[error("field {field} contains characters not representable in the legacy text encoding")]
    TextEncoding { field: &'static str },

    /// Old and new histories for one security share no date.
    #[error("no overlapping date between old and new history for {security_code}")]
    NoOverlap { security_code: String },

    #[error("offset {offset} (+{len} bytes) out of range for file of {file_len} bytes")]
    OffsetOutOfRange { offset: u64, len: u64, file_len: u64 },

    #[error("field values do not match layout: {detail}")]
    FieldValueMismatch { detail: String },

    /// IDX record counts disagree with the DAT record total, or a merged
    /// result failed its post-conditions.
    #[error("inconsistent store totals: {detail}")]
    InconsistentTotals { detail: String },

    #[error("configuration error: {detail}")]
    Config { detail: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExtError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub fn inconsistent(detail: impl Into<String>) -> Self {
        Self::InconsistentTotals {
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// Attach a path to an I/O error, promoting the kinds callers act on.
    pub fn io_at(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::Io(err),
        }
    }

    /// Whether the error is contained at record or security level.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::TruncatedRecord { .. } | Self::NoOverlap { .. })
    }
}
