//! Fixed-width legacy text fields.
//!
//! Names and security codes are stored GBK-encoded and NUL-padded to the
//! field width. Decoding never fails: malformed sequences become U+FFFD.

use encoding_rs::GBK;
use extstore_error::{ExtError, Result};

/// Decode a NUL-padded GBK field, stripping trailing NUL bytes.
#[must_use]
pub fn decode_fixed_text(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
    let (text, _had_errors) = GBK.decode_without_bom_handling(&bytes[..end]);
    text.into_owned()
}

/// Append `text` GBK-encoded and NUL-padded to exactly `width` bytes.
pub fn encode_fixed_text(
    out: &mut Vec<u8>,
    field: &'static str,
    text: &str,
    width: usize,
) -> Result<()> {
    let (encoded, _, unmappable) = GBK.encode(text);
    if unmappable {
        return Err(ExtError::TextEncoding { field });
    }
    if encoded.len() > width {
        return Err(ExtError::FieldTooLong {
            field,
            width,
            actual: encoded.len(),
        });
    }
    out.extend_from_slice(&encoded);
    out.resize(out.len() + (width - encoded.len()), 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_nul_only() {
        assert_eq!(decode_fixed_text(b"000001\0"), "000001");
        assert_eq!(decode_fixed_text(b"\0\0\0"), "");
        assert_eq!(decode_fixed_text(b"a\0b\0\0"), "a\0b");
    }

    #[test]
    fn gbk_round_trip() {
        let mut out = Vec::new();
        encode_fixed_text(&mut out, "name", "均线50", 64).expect("fits");
        assert_eq!(out.len(), 64);
        // two CJK chars at two bytes each plus two ASCII digits
        assert_eq!(out.iter().rposition(|&b| b != 0), Some(5));
        assert_eq!(decode_fixed_text(&out), "均线50");
    }

    #[test]
    fn malformed_bytes_are_replaced() {
        let text = decode_fixed_text(&[b'A', 0x81, 0x00, 0x00]);
        assert!(text.starts_with('A'));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn too_long_is_rejected() {
        let mut out = Vec::new();
        let err = encode_fixed_text(&mut out, "security_code", "12345678", 7)
            .expect_err("8 bytes into 7");
        assert!(matches!(
            err,
            ExtError::FieldTooLong {
                field: "security_code",
                width: 7,
                actual: 8
            }
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn exact_width_fits_without_padding() {
        let mut out = Vec::new();
        encode_fixed_text(&mut out, "security_code", "1234567", 7).expect("exact fit");
        assert_eq!(out, b"1234567");
    }

    #[test]
    fn unmappable_text_is_rejected() {
        let mut out = Vec::new();
        let err = encode_fixed_text(&mut out, "name", "\u{1F600}", 64).expect_err("emoji");
        assert!(matches!(err, ExtError::TextEncoding { field: "name" }));
    }
}
