//! Whole-file record streams.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use extstore_error::{ExtError, Result};
use extstore_types::FixedRecord;
use tracing::{debug, warn};

/// A file of fixed-size records.
///
/// Holds only the path: every [`iter`](RecordFile::iter) call reopens the
/// file, so a `RecordFile` can be scanned any number of times.
#[derive(Debug, Clone)]
pub struct RecordFile<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: FixedRecord> RecordFile<R> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        fs::metadata(path).map_err(|err| ExtError::io_at(path, err))?;
        Ok(Self {
            path: path.to_path_buf(),
            _record: PhantomData,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of complete records currently in the file.
    pub fn record_count(&self) -> Result<u64> {
        let len = fs::metadata(&self.path)
            .map_err(|err| ExtError::io_at(&self.path, err))?
            .len();
        Ok(len / R::SIZE as u64)
    }

    pub fn iter(&self) -> Result<RecordIter<R>> {
        let file = File::open(&self.path).map_err(|err| ExtError::io_at(&self.path, err))?;
        let len = file.metadata()?.len();
        let size = R::SIZE as u64;
        let trailing = len % size;
        if trailing != 0 {
            warn!(
                path = %self.path.display(),
                kind = R::KIND,
                trailing_bytes = trailing,
                "trailing partial record will be ignored"
            );
        }
        debug!(
            path = %self.path.display(),
            kind = R::KIND,
            file_size = len,
            records = len / size,
            "scanning record file"
        );
        Ok(RecordIter {
            reader: BufReader::new(file),
            path: self.path.clone(),
            remaining: len / size,
            index: 0,
            buf: vec![0; R::SIZE],
            done: false,
            _record: PhantomData,
        })
    }
}

/// Lazy record-by-record decoder over one open file.
///
/// Ends early, with a warning, if a short read shows the file shrank after
/// it was opened.
pub struct RecordIter<R> {
    reader: BufReader<File>,
    path: PathBuf,
    remaining: u64,
    index: u64,
    buf: Vec<u8>,
    done: bool,
    _record: PhantomData<fn() -> R>,
}

impl<R: FixedRecord> Iterator for RecordIter<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }
        let filled = match read_up_to(&mut self.reader, &mut self.buf) {
            Ok(filled) => filled,
            Err(err) => {
                self.done = true;
                return Some(Err(ExtError::io_at(&self.path, err)));
            }
        };
        if filled < R::SIZE {
            self.done = true;
            let err = ExtError::TruncatedRecord {
                record: R::KIND,
                expected: R::SIZE,
                actual: filled,
            };
            warn!(
                path = %self.path.display(),
                record_index = self.index,
                error = %err,
                "stopping scan at truncated record"
            );
            return None;
        }
        self.remaining -= 1;
        self.index += 1;
        match R::decode(&self.buf) {
            Ok(record) => Some(Ok(record)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        (0, usize::try_from(self.remaining).ok())
    }
}

/// Fill `buf` as far as the reader allows; returns the bytes read.
pub(crate) fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Decode every complete record in `path`.
pub fn read_all<R: FixedRecord>(path: impl AsRef<Path>) -> Result<Vec<R>> {
    RecordFile::<R>::open(path)?.iter()?.collect()
}

/// Encode `records` into `writer`; returns the number written.
pub fn write_records<'a, R, W, I>(writer: &mut W, records: I) -> Result<u64>
where
    R: FixedRecord + 'a,
    W: Write,
    I: IntoIterator<Item = &'a R>,
{
    let mut scratch = Vec::with_capacity(R::SIZE);
    let mut written = 0u64;
    for record in records {
        scratch.clear();
        record.encode_into(&mut scratch)?;
        writer.write_all(&scratch)?;
        written += 1;
    }
    Ok(written)
}

/// Replace `path` with the encoded `records`.
///
/// Writes straight to the destination; callers needing all-or-nothing output
/// stage through [`StagedFile`](crate::StagedFile) instead.
pub fn write_all<'a, R, I>(path: impl AsRef<Path>, records: I) -> Result<u64>
where
    R: FixedRecord + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|err| ExtError::io_at(path, err))?;
    let mut writer = BufWriter::new(file);
    let written = write_records(&mut writer, records)?;
    writer.flush()?;
    debug!(
        path = %path.display(),
        kind = R::KIND,
        records = written,
        "record file written"
    );
    Ok(written)
}
