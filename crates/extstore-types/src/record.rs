//! INFO, IDX and DAT record types.

use serde::{Deserialize, Serialize};

use extstore_error::{ExtError, Result};

use crate::codec::{
    FixedRecord, append_f32_le, append_u16_le, append_u32_le, ensure_len, read_f32_le,
    read_slice, read_u16_le, read_u32_le,
};
use crate::layout::{
    DAT_RECORD_SIZE, IDX_CODE_WIDTH, IDX_RECORD_SIZE, IDX_RESERVED_WIDTH, INFO_NAME_WIDTH,
    INFO_RECORD_SIZE, INFO_RESERVED_A_WIDTH, INFO_RESERVED_B_WIDTH,
};
use crate::text::{decode_fixed_text, encode_fixed_text};

/// Indicator metadata: one 293-byte record per indicator slot.
///
/// The two reserved blocks hold formula names and parameters that are not
/// modeled; they are carried verbatim so rewriting a record is lossless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoRecord {
    pub seq: u16,
    pub name: String,
    pub generation_date: u32,
    pub generation_time: u32,
    pub generation_millis: u32,
    #[serde(skip_serializing)]
    pub reserved_a: Vec<u8>,
    pub period_start_date: u32,
    pub period_end_date: u32,
    #[serde(skip_serializing)]
    pub reserved_b: Vec<u8>,
}

impl InfoRecord {
    /// A record with zeroed reserved blocks.
    #[must_use]
    pub fn new(seq: u16, name: impl Into<String>) -> Self {
        Self {
            seq,
            name: name.into(),
            generation_date: 0,
            generation_time: 0,
            generation_millis: 0,
            reserved_a: vec![0; INFO_RESERVED_A_WIDTH],
            period_start_date: 0,
            period_end_date: 0,
            reserved_b: vec![0; INFO_RESERVED_B_WIDTH],
        }
    }
}

impl FixedRecord for InfoRecord {
    const SIZE: usize = INFO_RECORD_SIZE;
    const KIND: &'static str = "INFO";

    fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE, Self::KIND)?;
        let mut cursor = 0usize;
        let seq = read_u16_le(bytes, &mut cursor, "seq")?;
        let name = decode_fixed_text(read_slice(bytes, &mut cursor, INFO_NAME_WIDTH, "name")?);
        let generation_date = read_u32_le(bytes, &mut cursor, "generation_date")?;
        let generation_time = read_u32_le(bytes, &mut cursor, "generation_time")?;
        let generation_millis = read_u32_le(bytes, &mut cursor, "generation_millis")?;
        let reserved_a =
            read_slice(bytes, &mut cursor, INFO_RESERVED_A_WIDTH, "reserved_a")?.to_vec();
        let period_start_date = read_u32_le(bytes, &mut cursor, "period_start_date")?;
        let period_end_date = read_u32_le(bytes, &mut cursor, "period_end_date")?;
        let reserved_b =
            read_slice(bytes, &mut cursor, INFO_RESERVED_B_WIDTH, "reserved_b")?.to_vec();
        Ok(Self {
            seq,
            name,
            generation_date,
            generation_time,
            generation_millis,
            reserved_a,
            period_start_date,
            period_end_date,
            reserved_b,
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        append_u16_le(out, self.seq);
        encode_fixed_text(out, "name", &self.name, INFO_NAME_WIDTH)?;
        append_u32_le(out, self.generation_date);
        append_u32_le(out, self.generation_time);
        append_u32_le(out, self.generation_millis);
        append_opaque(out, "reserved_a", &self.reserved_a, INFO_RESERVED_A_WIDTH)?;
        append_u32_le(out, self.period_start_date);
        append_u32_le(out, self.period_end_date);
        append_opaque(out, "reserved_b", &self.reserved_b, INFO_RESERVED_B_WIDTH)?;
        Ok(())
    }
}

/// Opaque blocks shorter than their width are zero-padded.
fn append_opaque(
    out: &mut Vec<u8>,
    field: &'static str,
    bytes: &[u8],
    width: usize,
) -> Result<()> {
    if bytes.len() > width {
        return Err(ExtError::FieldTooLong {
            field,
            width,
            actual: bytes.len(),
        });
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + (width - bytes.len()), 0);
    Ok(())
}

/// One security's entry in an IDX file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdxRecord {
    pub market_code: u16,
    pub security_code: String,
    pub record_count: u32,
}

impl IdxRecord {
    #[must_use]
    pub fn new(market_code: u16, security_code: impl Into<String>, record_count: u32) -> Self {
        Self {
            market_code,
            security_code: security_code.into(),
            record_count,
        }
    }
}

impl FixedRecord for IdxRecord {
    const SIZE: usize = IDX_RECORD_SIZE;
    const KIND: &'static str = "IDX";

    fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE, Self::KIND)?;
        let mut cursor = 0usize;
        let market_code = read_u16_le(bytes, &mut cursor, "market_code")?;
        let security_code =
            decode_fixed_text(read_slice(bytes, &mut cursor, IDX_CODE_WIDTH, "security_code")?);
        read_slice(bytes, &mut cursor, IDX_RESERVED_WIDTH, "reserved")?;
        let record_count = read_u32_le(bytes, &mut cursor, "record_count")?;
        Ok(Self {
            market_code,
            security_code,
            record_count,
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        append_u16_le(out, self.market_code);
        encode_fixed_text(out, "security_code", &self.security_code, IDX_CODE_WIDTH)?;
        out.extend_from_slice(&[0u8; IDX_RESERVED_WIDTH]);
        append_u32_le(out, self.record_count);
        Ok(())
    }
}

/// One time-series point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatRecord {
    /// `YYYYMMDD`.
    pub date: u32,
    /// `HHMMSS`, or 0 for daily data.
    pub time: u32,
    pub value: f32,
}

impl DatRecord {
    #[must_use]
    pub const fn daily(date: u32, value: f32) -> Self {
        Self {
            date,
            time: 0,
            value,
        }
    }
}

impl FixedRecord for DatRecord {
    const SIZE: usize = DAT_RECORD_SIZE;
    const KIND: &'static str = "DAT";

    fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE, Self::KIND)?;
        let mut cursor = 0usize;
        Ok(Self {
            date: read_u32_le(bytes, &mut cursor, "date")?,
            time: read_u32_le(bytes, &mut cursor, "time")?,
            value: read_f32_le(bytes, &mut cursor, "value")?,
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        append_u32_le(out, self.date);
        append_u32_le(out, self.time);
        append_f32_le(out, self.value);
        Ok(())
    }
}

fn to_array<const N: usize>(bytes: Vec<u8>, kind: &str) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| ExtError::internal(format!("{kind} encoded to {} bytes", v.len())))
}

pub fn decode_info(bytes: &[u8]) -> Result<InfoRecord> {
    InfoRecord::decode(bytes)
}

pub fn encode_info(record: &InfoRecord) -> Result<[u8; INFO_RECORD_SIZE]> {
    to_array(record.encode()?, InfoRecord::KIND)
}

pub fn decode_idx(bytes: &[u8]) -> Result<IdxRecord> {
    IdxRecord::decode(bytes)
}

pub fn encode_idx(record: &IdxRecord) -> Result<[u8; IDX_RECORD_SIZE]> {
    to_array(record.encode()?, IdxRecord::KIND)
}

pub fn decode_dat(bytes: &[u8]) -> Result<DatRecord> {
    DatRecord::decode(bytes)
}

pub fn encode_dat(record: &DatRecord) -> Result<[u8; DAT_RECORD_SIZE]> {
    to_array(record.encode()?, DatRecord::KIND)
}

/// Most recent generation date across an INFO file, if any record has one.
#[must_use]
pub fn latest_generation_date(records: &[InfoRecord]) -> Option<u32> {
    records
        .iter()
        .map(|record| record.generation_date)
        .filter(|&date| date != 0)
        .max()
}

/// Display name for the exchange enumerated by `market_code`.
///
/// The mapping is a terminal convention; nothing in the store enforces it.
#[must_use]
pub const fn market_name(market_code: u16) -> Option<&'static str> {
    match market_code {
        0 => Some("SZ"),
        1 => Some("SH"),
        2 => Some("BJ"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx_byte_layout() {
        let bytes = encode_idx(&IdxRecord::new(1, "600000", 0x0102_0304)).expect("encode");
        assert_eq!(&bytes[0..2], &[1, 0]);
        assert_eq!(&bytes[2..9], b"600000\0");
        assert!(bytes[9..25].iter().all(|&b| b == 0));
        assert_eq!(&bytes[25..29], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn idx_decode_ignores_reserved_bytes() {
        let mut bytes = encode_idx(&IdxRecord::new(0, "000001", 3)).expect("encode");
        bytes[12] = 0xFF;
        let record = decode_idx(&bytes).expect("decode");
        assert_eq!(record, IdxRecord::new(0, "000001", 3));
    }

    #[test]
    fn dat_byte_layout() {
        let bytes = encode_dat(&DatRecord {
            date: 20240905,
            time: 144200,
            value: 1.5,
        })
        .expect("encode");
        assert_eq!(&bytes[0..4], &20240905u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &144200u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1.5f32.to_le_bytes());
    }

    #[test]
    fn info_field_offsets() {
        let mut record = InfoRecord::new(7, "RPS");
        record.generation_date = 20250827;
        record.generation_time = 153000;
        record.period_start_date = 20230822;
        record.period_end_date = 20240820;
        let bytes = encode_info(&record).expect("encode");
        assert_eq!(&bytes[0x42..0x46], &20250827u32.to_le_bytes());
        assert_eq!(&bytes[0x46..0x4A], &153000u32.to_le_bytes());
        assert_eq!(&bytes[0xA1..0xA5], &20230822u32.to_le_bytes());
        assert_eq!(&bytes[0xA5..0xA9], &20240820u32.to_le_bytes());
        assert_eq!(decode_info(&bytes).expect("decode"), record);
    }

    #[test]
    fn info_reserved_blocks_survive() {
        let mut record = InfoRecord::new(1, "x");
        record.reserved_a = (0..83u8).collect();
        record.reserved_b = vec![0xAB; 124];
        let decoded = decode_info(&encode_info(&record).expect("encode")).expect("decode");
        assert_eq!(decoded.reserved_a, record.reserved_a);
        assert_eq!(decoded.reserved_b, record.reserved_b);
    }

    #[test]
    fn oversized_reserved_block_is_rejected() {
        let mut record = InfoRecord::new(1, "x");
        record.reserved_a = vec![0; 84];
        assert!(matches!(
            record.encode(),
            Err(ExtError::FieldTooLong {
                field: "reserved_a",
                ..
            })
        ));
    }

    #[test]
    fn truncated_buffers_fail() {
        assert!(matches!(
            decode_dat(&[0; 11]),
            Err(ExtError::TruncatedRecord {
                record: "DAT",
                expected: 12,
                actual: 11
            })
        ));
        assert!(matches!(
            decode_idx(&[0; 28]),
            Err(ExtError::TruncatedRecord { record: "IDX", .. })
        ));
        assert!(matches!(
            decode_info(&[0; 292]),
            Err(ExtError::TruncatedRecord { record: "INFO", .. })
        ));
    }

    #[test]
    fn long_security_code_is_rejected() {
        let err = encode_idx(&IdxRecord::new(0, "SH6000001", 1)).expect_err("too long");
        assert!(matches!(
            err,
            ExtError::FieldTooLong {
                field: "security_code",
                ..
            }
        ));
    }

    #[test]
    fn latest_generation_date_skips_blank_slots() {
        let mut a = InfoRecord::new(1, "a");
        a.generation_date = 20250820;
        let b = InfoRecord::new(2, "blank");
        let mut c = InfoRecord::new(3, "c");
        c.generation_date = 20250827;
        assert_eq!(latest_generation_date(&[a, b, c]), Some(20250827));
        assert_eq!(latest_generation_date(&[InfoRecord::new(1, "z")]), None);
    }

    #[test]
    fn info_serializes_without_reserved_blocks() {
        let json = serde_json::to_value(InfoRecord::new(3, "MA50")).expect("json");
        assert_eq!(json["name"], "MA50");
        assert!(json.get("reserved_a").is_none());
    }

    #[test]
    fn market_names() {
        assert_eq!(market_name(0), Some("SZ"));
        assert_eq!(market_name(1), Some("SH"));
        assert_eq!(market_name(9), None);
    }
}
