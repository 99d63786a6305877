//! Declared field tables for the three record kinds.
//!
//! Each table lists the on-disk fields in order. The sum of their widths must
//! equal the record's fixed size; this is asserted at compile time and again
//! by [`check_layouts`], which file-level entry points call before touching
//! the filesystem.

use extstore_error::{ExtError, Result};

/// INFO record size in bytes.
pub const INFO_RECORD_SIZE: usize = 293;
/// IDX record size in bytes.
pub const IDX_RECORD_SIZE: usize = 29;
/// DAT record size in bytes.
pub const DAT_RECORD_SIZE: usize = 12;

/// Width of the INFO `name` text field.
pub const INFO_NAME_WIDTH: usize = 64;
/// Width of the first opaque INFO block (formula name and parameters).
pub const INFO_RESERVED_A_WIDTH: usize = 83;
/// Width of the trailing opaque INFO block.
pub const INFO_RESERVED_B_WIDTH: usize = 124;
/// Width of the IDX `security_code` text field.
pub const IDX_CODE_WIDTH: usize = 7;
/// Width of the zero-filled IDX block.
pub const IDX_RESERVED_WIDTH: usize = 16;

/// Byte offset of `generation_date` inside an INFO record.
pub const INFO_GENERATION_DATE_OFFSET: usize = 0x42;
/// Byte offset of `period_start_date` inside an INFO record.
pub const INFO_PERIOD_START_OFFSET: usize = 0xA1;

/// One named field of a fixed-width record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: usize,
}

/// Ordered field table for one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub kind: &'static str,
    pub size: usize,
    pub fields: &'static [FieldSpec],
}

impl RecordLayout {
    /// Sum of the declared field widths.
    #[must_use]
    pub const fn computed_size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].width;
            i += 1;
        }
        total
    }

    /// Byte offset of the named field, if declared.
    #[must_use]
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for field in self.fields {
            if field.name == name {
                return Some(offset);
            }
            offset += field.width;
        }
        None
    }

    pub fn check(&self) -> Result<()> {
        let computed = self.computed_size();
        if computed != self.size {
            return Err(ExtError::LayoutMismatch {
                record: self.kind,
                declared: self.size,
                computed,
            });
        }
        Ok(())
    }
}

const fn field(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec { name, width }
}

pub const INFO_LAYOUT: RecordLayout = RecordLayout {
    kind: "INFO",
    size: INFO_RECORD_SIZE,
    fields: &[
        field("seq", 2),
        field("name", INFO_NAME_WIDTH),
        field("generation_date", 4),
        field("generation_time", 4),
        field("generation_millis", 4),
        field("reserved_a", INFO_RESERVED_A_WIDTH),
        field("period_start_date", 4),
        field("period_end_date", 4),
        field("reserved_b", INFO_RESERVED_B_WIDTH),
    ],
};

pub const IDX_LAYOUT: RecordLayout = RecordLayout {
    kind: "IDX",
    size: IDX_RECORD_SIZE,
    fields: &[
        field("market_code", 2),
        field("security_code", IDX_CODE_WIDTH),
        field("reserved", IDX_RESERVED_WIDTH),
        field("record_count", 4),
    ],
};

pub const DAT_LAYOUT: RecordLayout = RecordLayout {
    kind: "DAT",
    size: DAT_RECORD_SIZE,
    fields: &[field("date", 4), field("time", 4), field("value", 4)],
};

const _: () = assert!(INFO_LAYOUT.computed_size() == INFO_RECORD_SIZE);
const _: () = assert!(IDX_LAYOUT.computed_size() == IDX_RECORD_SIZE);
const _: () = assert!(DAT_LAYOUT.computed_size() == DAT_RECORD_SIZE);

/// Verify every record layout before any file I/O.
pub fn check_layouts() -> Result<()> {
    for layout in [&INFO_LAYOUT, &IDX_LAYOUT, &DAT_LAYOUT] {
        layout.check()?;
    }
    Ok(())
}
