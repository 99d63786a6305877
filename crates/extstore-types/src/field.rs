//! Scalar field layouts for in-place record patches.

use std::fmt;

use extstore_error::{ExtError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    U8,
    U16,
    U32,
    I32,
    F32,
}

impl ScalarKind {
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }

    /// `B`, `H`, `I`, `i`, `f`.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            'B' => Some(Self::U8),
            'H' => Some(Self::U16),
            'I' => Some(Self::U32),
            'i' => Some(Self::I32),
            'f' => Some(Self::F32),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::U8 => 'B',
            Self::U16 => 'H',
            Self::U32 => 'I',
            Self::I32 => 'i',
            Self::F32 => 'f',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    I32(i32),
    F32(f32),
}

impl FieldValue {
    #[must_use]
    pub const fn kind(self) -> ScalarKind {
        match self {
            Self::U8(_) => ScalarKind::U8,
            Self::U16(_) => ScalarKind::U16,
            Self::U32(_) => ScalarKind::U32,
            Self::I32(_) => ScalarKind::I32,
            Self::F32(_) => ScalarKind::F32,
        }
    }

    /// Parse a textual value as `kind`. Integers accept a `0x` prefix.
    pub fn parse(kind: ScalarKind, text: &str) -> Result<Self> {
        let text = text.trim();
        let bad = || ExtError::FieldValueMismatch {
            detail: format!("cannot parse {text:?} as {kind:?}"),
        };
        let int = |text: &str| -> Result<i64> {
            let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16),
                None => text.parse::<i64>(),
            };
            parsed.map_err(|_| bad())
        };
        Ok(match kind {
            ScalarKind::U8 => Self::U8(u8::try_from(int(text)?).map_err(|_| bad())?),
            ScalarKind::U16 => Self::U16(u16::try_from(int(text)?).map_err(|_| bad())?),
            ScalarKind::U32 => Self::U32(u32::try_from(int(text)?).map_err(|_| bad())?),
            ScalarKind::I32 => Self::I32(i32::try_from(int(text)?).map_err(|_| bad())?),
            ScalarKind::F32 => Self::F32(text.parse::<f32>().map_err(|_| bad())?),
        })
    }

    fn append_le(self, out: &mut Vec<u8>) {
        match self {
            Self::U8(v) => out.push(v),
            Self::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
}

/// Ordered scalar fields written contiguously, little-endian, no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    kinds: Vec<ScalarKind>,
}

impl FieldLayout {
    #[must_use]
    pub fn new(kinds: Vec<ScalarKind>) -> Self {
        Self { kinds }
    }

    /// Two consecutive `u32`s, e.g. a date pair.
    #[must_use]
    pub fn u32_pair() -> Self {
        Self::new(vec![ScalarKind::U32, ScalarKind::U32])
    }

    /// Parse a compact code string such as `"II"` or `"<HI"`.
    ///
    /// A leading `<` is accepted for readability; every layout is
    /// little-endian regardless.
    pub fn parse(codes: &str) -> Result<Self> {
        let body = codes.strip_prefix('<').unwrap_or(codes);
        if body.is_empty() {
            return Err(ExtError::FieldValueMismatch {
                detail: "empty field layout".to_owned(),
            });
        }
        body.chars()
            .map(|code| {
                ScalarKind::from_code(code).ok_or_else(|| ExtError::FieldValueMismatch {
                    detail: format!("unknown field code {code:?} in layout {codes:?}"),
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    #[must_use]
    pub fn kinds(&self) -> &[ScalarKind] {
        &self.kinds
    }

    /// Total bytes spanned by the layout.
    #[must_use]
    pub fn width(&self) -> usize {
        self.kinds.iter().map(|kind| kind.width()).sum()
    }

    /// Parse one textual value per field.
    pub fn parse_values<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<FieldValue>> {
        if texts.len() != self.kinds.len() {
            return Err(ExtError::FieldValueMismatch {
                detail: format!(
                    "layout {self} expects {} values, got {}",
                    self.kinds.len(),
                    texts.len()
                ),
            });
        }
        self.kinds
            .iter()
            .zip(texts)
            .map(|(&kind, text)| FieldValue::parse(kind, text.as_ref()))
            .collect()
    }

    /// Encode `values`, which must match the layout one-to-one by kind.
    pub fn encode(&self, values: &[FieldValue]) -> Result<Vec<u8>> {
        if values.len() != self.kinds.len() {
            return Err(ExtError::FieldValueMismatch {
                detail: format!(
                    "layout {self} expects {} values, got {}",
                    self.kinds.len(),
                    values.len()
                ),
            });
        }
        let mut out = Vec::with_capacity(self.width());
        for (position, (&kind, &value)) in self.kinds.iter().zip(values).enumerate() {
            if value.kind() != kind {
                return Err(ExtError::FieldValueMismatch {
                    detail: format!(
                        "value {position} is {:?}, layout {self} wants {kind:?}",
                        value.kind()
                    ),
                });
            }
            value.append_le(&mut out);
        }
        Ok(out)
    }
}

impl fmt::Display for FieldLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in &self.kinds {
            write!(f, "{}", kind.code())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_width() {
        let layout = FieldLayout::parse("<II").expect("parse");
        assert_eq!(layout, FieldLayout::u32_pair());
        assert_eq!(layout.width(), 8);
        assert_eq!(layout.to_string(), "II");
        assert_eq!(FieldLayout::parse("HBf").expect("parse").width(), 7);
    }

    #[test]
    fn parse_rejects_unknown_codes() {
        assert!(FieldLayout::parse("Iq").is_err());
        assert!(FieldLayout::parse("<").is_err());
    }

    #[test]
    fn encode_date_pair() {
        let bytes = FieldLayout::u32_pair()
            .encode(&[FieldValue::U32(20230822), FieldValue::U32(20240820)])
            .expect("encode");
        assert_eq!(&bytes[..4], &20230822u32.to_le_bytes());
        assert_eq!(&bytes[4..], &20240820u32.to_le_bytes());
    }

    #[test]
    fn encode_rejects_count_and_kind_mismatch() {
        let layout = FieldLayout::u32_pair();
        assert!(matches!(
            layout.encode(&[FieldValue::U32(1)]),
            Err(ExtError::FieldValueMismatch { .. })
        ));
        assert!(matches!(
            layout.encode(&[FieldValue::U32(1), FieldValue::F32(2.0)]),
            Err(ExtError::FieldValueMismatch { .. })
        ));
    }

    #[test]
    fn parse_values_by_kind() {
        let layout = FieldLayout::parse("Hif").expect("parse");
        let values = layout
            .parse_values(&["0x10", "-5", "2.5"])
            .expect("values");
        assert_eq!(
            values,
            vec![
                FieldValue::U16(16),
                FieldValue::I32(-5),
                FieldValue::F32(2.5)
            ]
        );
        assert!(layout.parse_values(&["70000", "1", "1"]).is_err());
        assert!(layout.parse_values(&["1", "1"]).is_err());
    }
}
