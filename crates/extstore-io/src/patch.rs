//! In-place field patches on an existing INFO file.
//!
//! A patch overwrites exactly `layout.width()` bytes at
//! `index * INFO_RECORD_SIZE + field_offset` for each selected record. Every
//! target span is checked against the file length before the first write, so
//! an out-of-range index leaves the file unchanged.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use extstore_error::{ExtError, Result};
use extstore_types::{
    FieldLayout, FieldValue, INFO_GENERATION_DATE_OFFSET, INFO_PERIOD_START_OFFSET,
    INFO_RECORD_SIZE, check_layouts,
};
use tracing::{debug, info};

/// Overwrite one field span in each record listed in `record_indices`.
///
/// Returns the number of spans written. The file is opened for update and
/// never created, truncated or extended.
pub fn patch_records(
    path: impl AsRef<Path>,
    record_indices: &[u64],
    field_offset: usize,
    layout: &FieldLayout,
    values: &[FieldValue],
) -> Result<usize> {
    check_layouts()?;
    let path = path.as_ref();
    let payload = layout.encode(values)?;
    let width = payload.len() as u64;

    if field_offset
        .checked_add(payload.len())
        .is_none_or(|end| end > INFO_RECORD_SIZE)
    {
        return Err(ExtError::OffsetOutOfRange {
            offset: field_offset as u64,
            len: width,
            file_len: INFO_RECORD_SIZE as u64,
        });
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| ExtError::io_at(path, err))?;
    let file_len = file.metadata()?.len();

    let mut targets = Vec::with_capacity(record_indices.len());
    for &index in record_indices {
        let offset = index
            .checked_mul(INFO_RECORD_SIZE as u64)
            .and_then(|base| base.checked_add(field_offset as u64))
            .ok_or_else(|| ExtError::internal(format!("record index {index} overflows")))?;
        if offset.saturating_add(width) > file_len {
            return Err(ExtError::OffsetOutOfRange {
                offset,
                len: width,
                file_len,
            });
        }
        targets.push(offset);
    }

    for &offset in &targets {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&payload)?;
        debug!(path = %path.display(), offset, len = width, "patched field");
    }
    file.sync_data()?;

    info!(
        path = %path.display(),
        records = targets.len(),
        field_offset,
        layout = %layout,
        "INFO records patched"
    );
    Ok(targets.len())
}

/// Write the generation date and time of each selected INFO record.
pub fn stamp_generation(
    path: impl AsRef<Path>,
    record_indices: &[u64],
    date: u32,
    time: u32,
) -> Result<usize> {
    patch_records(
        path,
        record_indices,
        INFO_GENERATION_DATE_OFFSET,
        &FieldLayout::u32_pair(),
        &[FieldValue::U32(date), FieldValue::U32(time)],
    )
}

/// Write the period start and end dates of each selected INFO record.
pub fn set_period(
    path: impl AsRef<Path>,
    record_indices: &[u64],
    start_date: u32,
    end_date: u32,
) -> Result<usize> {
    patch_records(
        path,
        record_indices,
        INFO_PERIOD_START_OFFSET,
        &FieldLayout::u32_pair(),
        &[FieldValue::U32(start_date), FieldValue::U32(end_date)],
    )
}
