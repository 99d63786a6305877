//! Record output staged in a temporary file beside its destination.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use extstore_error::{ExtError, Result};
use extstore_types::FixedRecord;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, error, warn};

fn staging_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// A destination file under construction.
///
/// Records go to a temporary file in the destination's directory; the
/// destination is replaced only by [`commit`](StagedFile::commit). Dropping
/// a `StagedFile` without committing removes the temporary file and leaves
/// the destination as it was.
pub struct StagedFile {
    target: PathBuf,
    writer: BufWriter<NamedTempFile>,
    scratch: Vec<u8>,
    records: u64,
    bytes: u64,
}

impl StagedFile {
    pub fn create(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref();
        let dir = staging_dir(target);
        let temp = NamedTempFile::new_in(dir).map_err(|err| ExtError::io_at(dir, err))?;
        debug!(
            path = %target.display(),
            staging = %temp.path().display(),
            "staging output"
        );
        Ok(Self {
            target: target.to_path_buf(),
            writer: BufWriter::new(temp),
            scratch: Vec::new(),
            records: 0,
            bytes: 0,
        })
    }

    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    #[must_use]
    pub const fn records_written(&self) -> u64 {
        self.records
    }

    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub fn append<R: FixedRecord>(&mut self, record: &R) -> Result<()> {
        self.scratch.clear();
        record.encode_into(&mut self.scratch)?;
        self.writer.write_all(&self.scratch)?;
        self.records += 1;
        self.bytes += self.scratch.len() as u64;
        Ok(())
    }

    pub fn append_all<'a, R, I>(&mut self, records: I) -> Result<()>
    where
        R: FixedRecord + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Flush, check the staged length, then atomically replace the target.
    pub fn commit(self) -> Result<PathBuf> {
        let temp = self
            .writer
            .into_inner()
            .map_err(|err| ExtError::Io(err.into_error()))?;
        temp.as_file().sync_all()?;
        let staged_len = temp.as_file().metadata()?.len();
        if staged_len != self.bytes {
            return Err(ExtError::internal(format!(
                "staged {} holds {staged_len} bytes, expected {}",
                self.target.display(),
                self.bytes
            )));
        }
        temp.persist(&self.target)
            .map_err(|err| ExtError::io_at(&self.target, err.error))?;
        debug!(
            path = %self.target.display(),
            records = self.records,
            bytes = self.bytes,
            "staged output committed"
        );
        Ok(self.target)
    }
}

/// The previous contents of a destination, kept until a commit completes.
struct Backup {
    target: PathBuf,
    saved: Option<(TempDir, PathBuf)>,
}

impl Backup {
    fn take(target: &Path) -> Result<Self> {
        match fs::metadata(target) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    target: target.to_path_buf(),
                    saved: None,
                });
            }
            Err(err) => return Err(ExtError::io_at(target, err)),
        }
        let dir = staging_dir(target);
        let holder = tempfile::Builder::new()
            .prefix(".extstore-backup")
            .tempdir_in(dir)
            .map_err(|err| ExtError::io_at(dir, err))?;
        let saved = holder.path().join("previous");
        if fs::hard_link(target, &saved).is_err() {
            fs::copy(target, &saved).map_err(|err| ExtError::io_at(target, err))?;
        }
        debug!(path = %target.display(), backup = %saved.display(), "destination saved");
        Ok(Self {
            target: target.to_path_buf(),
            saved: Some((holder, saved)),
        })
    }

    fn restore(self) -> Result<()> {
        let restored = match &self.saved {
            Some((_, saved)) => fs::rename(saved, &self.target),
            None => match fs::remove_file(&self.target) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        restored.map_err(|err| ExtError::io_at(&self.target, err))?;
        warn!(path = %self.target.display(), "destination restored");
        Ok(())
    }
}

/// Commit two staged files as a pair.
///
/// `first` is committed before `second`. If `second` fails, `first`'s
/// destination is put back as it was, so either both destinations are
/// replaced or neither is.
pub fn commit_pair(first: StagedFile, second: StagedFile) -> Result<(PathBuf, PathBuf)> {
    let backup = Backup::take(first.target())?;
    let first_path = first.commit()?;
    match second.commit() {
        Ok(second_path) => Ok((first_path, second_path)),
        Err(err) => {
            if let Err(restore_err) = backup.restore() {
                error!(
                    path = %first_path.display(),
                    error = %restore_err,
                    "could not restore destination after failed commit"
                );
            }
            Err(err)
        }
    }
}
