//! Windowed reads by record index.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use extstore_error::{ExtError, Result};
use extstore_types::FixedRecord;
use tracing::{debug, warn};

/// One read-only handle answering `[start, start + count)` record windows.
///
/// Each read seeks to the window and reads at most `count * R::SIZE` bytes;
/// nothing outside the window is touched.
#[derive(Debug)]
pub struct RangeReader<R> {
    file: File,
    path: PathBuf,
    file_len: u64,
    _record: PhantomData<fn() -> R>,
}

impl<R: FixedRecord> RangeReader<R> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| ExtError::io_at(path, err))?;
        let file_len = file.metadata()?.len();
        if file_len % R::SIZE as u64 != 0 {
            warn!(
                path = %path.display(),
                kind = R::KIND,
                trailing_bytes = file_len % R::SIZE as u64,
                "trailing partial record will be ignored"
            );
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            file_len,
            _record: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete records present when the handle was opened.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.file_len / R::SIZE as u64
    }

    /// Read up to `count` records starting at record index `start`.
    ///
    /// A window running past the end of the file yields the records that
    /// exist, logged as a warning. `count == 0` reads nothing.
    pub fn read_range(&mut self, start: u64, count: u64) -> Result<Vec<R>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let size = R::SIZE as u64;
        let byte_start = start
            .checked_mul(size)
            .ok_or_else(|| ExtError::internal(format!("record index {start} overflows")))?;
        let want_bytes = count
            .checked_mul(size)
            .ok_or_else(|| ExtError::internal(format!("record count {count} overflows")))?;

        let mut buf = Vec::new();
        if byte_start < self.file_len {
            self.file.seek(SeekFrom::Start(byte_start))?;
            (&mut self.file)
                .take(want_bytes)
                .read_to_end(&mut buf)
                .map_err(|err| ExtError::io_at(&self.path, err))?;
        }

        let complete = buf.len() / R::SIZE;
        if (complete as u64) < count {
            warn!(
                path = %self.path.display(),
                kind = R::KIND,
                start,
                requested = count,
                available = complete,
                "record window runs past end of file"
            );
        }
        debug!(
            path = %self.path.display(),
            kind = R::KIND,
            start,
            count = complete,
            "read record window"
        );
        buf.chunks_exact(R::SIZE).map(R::decode).collect()
    }
}

/// Open `path`, read one window, close it.
pub fn read_range<R: FixedRecord>(path: impl AsRef<Path>, start: u64, count: u64) -> Result<Vec<R>> {
    RangeReader::<R>::open(path)?.read_range(start, count)
}
