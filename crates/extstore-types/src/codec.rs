//! Little-endian field helpers and the [`FixedRecord`] trait.

use extstore_error::{ExtError, Result};

/// A record with a fixed on-disk size.
///
/// Files of these records have no header; record `i` starts at byte
/// `i * SIZE`.
pub trait FixedRecord: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;
    /// Short label used in logs and errors (`"INFO"`, `"IDX"`, `"DAT"`).
    const KIND: &'static str;

    /// Decode from the first `SIZE` bytes of `bytes`.
    ///
    /// Fails with [`ExtError::TruncatedRecord`] when fewer bytes are given.
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Append exactly `SIZE` bytes to `out`.
    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()>;

    fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.encode_into(&mut out)?;
        if out.len() != Self::SIZE {
            return Err(ExtError::internal(format!(
                "{} encoder produced {} bytes, expected {}",
                Self::KIND,
                out.len(),
                Self::SIZE
            )));
        }
        Ok(out)
    }
}

pub(crate) fn ensure_len(bytes: &[u8], expected: usize, record: &'static str) -> Result<()> {
    if bytes.len() < expected {
        return Err(ExtError::TruncatedRecord {
            record,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

pub(crate) fn append_u16_le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn append_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn append_f32_le(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_u16_le(bytes: &[u8], cursor: &mut usize, field: &str) -> Result<u16> {
    Ok(u16::from_le_bytes(read_array::<2>(bytes, cursor, field)?))
}

pub(crate) fn read_u32_le(bytes: &[u8], cursor: &mut usize, field: &str) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array::<4>(bytes, cursor, field)?))
}

pub(crate) fn read_f32_le(bytes: &[u8], cursor: &mut usize, field: &str) -> Result<f32> {
    Ok(f32::from_le_bytes(read_array::<4>(bytes, cursor, field)?))
}

pub(crate) fn read_slice<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    len: usize,
    field: &str,
) -> Result<&'a [u8]> {
    let end = cursor
        .checked_add(len)
        .ok_or_else(|| ExtError::internal(format!("overflow reading field {field}")))?;
    if end > bytes.len() {
        return Err(ExtError::internal(format!(
            "field {field} out of bounds: need {len} bytes at offset {}, total {}",
            *cursor,
            bytes.len()
        )));
    }
    let out = &bytes[*cursor..end];
    *cursor = end;
    Ok(out)
}

pub(crate) fn read_array<const N: usize>(
    bytes: &[u8],
    cursor: &mut usize,
    field: &str,
) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_slice(bytes, cursor, N, field)?);
    Ok(out)
}
