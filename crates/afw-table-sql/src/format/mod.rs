//! Column type and value literal formatting for MySQL.
//!
//! Every persistable [`FieldType`] has exactly one [`FieldFormatter`], which
//! derives the column's SQL type and renders values as SQL literals:
//!
//! | Tag    | Column type                                            | Literal                 |
//! |--------|--------------------------------------------------------|-------------------------|
//! | U      | `SMALLINT UNSIGNED NOT NULL`                           | decimal                 |
//! | I      | `INT NOT NULL`                                         | decimal                 |
//! | L      | `BIGINT NOT NULL`                                      | decimal                 |
//! | F      | `FLOAT`                                                | 7 significant digits    |
//! | D      | `DOUBLE`                                               | 17 significant digits   |
//! | Flag   | `BIT NOT NULL`                                         | `1` / `0`               |
//! | Angle  | `DOUBLE`                                               | degrees, 17 digits      |
//! | String | `VARCHAR(n) CHARACTER SET ascii COLLATE ascii_bin ...` | escaped, single-quoted  |
//! | Array* | `BINARY(n * width) NOT NULL` or `BLOB NOT NULL`        | little-endian `x'..'`   |
//!
//! NaN and infinite floats render as `NULL`; MySQL cannot store them in
//! `FLOAT` or `DOUBLE` columns.

use crate::core::identifier::escape_string_literal;
use crate::core::{ArrayElement, Field, FieldType, FieldValue};
use crate::error::{Result, StoreError};

/// Significant digits used for 32-bit floats.
pub const F32_DIGITS: usize = 7;

/// Significant digits used for 64-bit floats and angles.
pub const F64_DIGITS: usize = 17;

/// Largest string length or packed array size that can be ingested.
pub const MAX_FIELD_BYTES: usize = 65535;

/// Formatter for one persistable field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormatter {
    U16,
    I32,
    I64,
    F32,
    F64,
    Flag,
    Angle,
    String,
    Array(ArrayElement),
}

impl FieldFormatter {
    /// Formatter for a field type, or `None` if the type cannot be persisted.
    pub fn for_type(ty: &FieldType) -> Option<Self> {
        match ty {
            FieldType::U16 => Some(FieldFormatter::U16),
            FieldType::I32 => Some(FieldFormatter::I32),
            FieldType::I64 => Some(FieldFormatter::I64),
            FieldType::F32 => Some(FieldFormatter::F32),
            FieldType::F64 => Some(FieldFormatter::F64),
            FieldType::Flag => Some(FieldFormatter::Flag),
            FieldType::Angle => Some(FieldFormatter::Angle),
            FieldType::String => Some(FieldFormatter::String),
            FieldType::Array(element) => Some(FieldFormatter::Array(*element)),
            FieldType::Unsupported(_) => None,
        }
    }

    /// MySQL column type for a field.
    ///
    /// # Errors
    ///
    /// Zero-size strings and strings or packed arrays longer than
    /// [`MAX_FIELD_BYTES`] are rejected.
    pub fn sql_type(&self, field: &Field) -> Result<String> {
        let ty = match self {
            FieldFormatter::U16 => "SMALLINT UNSIGNED NOT NULL".to_string(),
            FieldFormatter::I32 => "INT NOT NULL".to_string(),
            FieldFormatter::I64 => "BIGINT NOT NULL".to_string(),
            FieldFormatter::F32 => "FLOAT".to_string(),
            FieldFormatter::F64 | FieldFormatter::Angle => "DOUBLE".to_string(),
            FieldFormatter::Flag => "BIT NOT NULL".to_string(),
            FieldFormatter::String => {
                if field.size == 0 {
                    return Err(StoreError::invalid_field(
                        &field.name,
                        "String field has zero size",
                    ));
                }
                if field.size > MAX_FIELD_BYTES {
                    return Err(StoreError::invalid_field(
                        &field.name,
                        "String field is too large for ingestion",
                    ));
                }
                // VARCHAR, since trailing spaces do not survive a CHAR round trip.
                format!(
                    "VARCHAR({}) CHARACTER SET ascii COLLATE ascii_bin NOT NULL",
                    field.size
                )
            }
            FieldFormatter::Array(element) => {
                if field.size == 0 {
                    return Ok("BLOB NOT NULL".to_string());
                }
                let bytes = field.size.saturating_mul(element.width());
                if bytes > MAX_FIELD_BYTES {
                    return Err(StoreError::invalid_field(
                        &field.name,
                        "Array field is too large for ingestion",
                    ));
                }
                format!("BINARY({}) NOT NULL", bytes)
            }
        };
        Ok(ty)
    }

    /// Render a value as a SQL literal. `None` is always `NULL`.
    pub fn format_value(&self, value: Option<&FieldValue>) -> Result<String> {
        let Some(value) = value else {
            return Ok("NULL".to_string());
        };
        let literal = match (self, value) {
            (FieldFormatter::U16, FieldValue::U16(v)) => v.to_string(),
            (FieldFormatter::I32, FieldValue::I32(v)) => v.to_string(),
            (FieldFormatter::I64, FieldValue::I64(v)) => v.to_string(),
            (FieldFormatter::F32, FieldValue::F32(v)) => format_number(f64::from(*v), F32_DIGITS),
            (FieldFormatter::F64, FieldValue::F64(v)) => format_number(*v, F64_DIGITS),
            (FieldFormatter::Angle, FieldValue::Angle(radians)) => {
                format_number(radians.to_degrees(), F64_DIGITS)
            }
            (FieldFormatter::Flag, FieldValue::Flag(v)) => if *v { "1" } else { "0" }.to_string(),
            (FieldFormatter::String, FieldValue::String(s)) => {
                format!("'{}'", escape_string_literal(s))
            }
            (FieldFormatter::Array(_), array) => match pack_array(array) {
                Some(bytes) => format!("x'{}'", hex::encode(bytes)),
                None => return Err(self.mismatch(value)),
            },
            _ => return Err(self.mismatch(value)),
        };
        Ok(literal)
    }

    /// Parse a value from its text-protocol form.
    ///
    /// Only the scalar types that retrieval maps columns to are supported.
    pub fn parse_text(&self, bytes: &[u8]) -> Result<FieldValue> {
        let text = || String::from_utf8_lossy(bytes);
        let bad = |e: &dyn std::fmt::Display| {
            StoreError::Unsupported(format!("cannot parse {:?} as {:?}: {}", text(), self, e))
        };
        let value = match self {
            FieldFormatter::U16 => FieldValue::U16(text().trim().parse().map_err(|e| bad(&e))?),
            FieldFormatter::I32 => FieldValue::I32(text().trim().parse().map_err(|e| bad(&e))?),
            FieldFormatter::I64 => FieldValue::I64(text().trim().parse().map_err(|e| bad(&e))?),
            FieldFormatter::F32 => FieldValue::F32(text().trim().parse().map_err(|e| bad(&e))?),
            FieldFormatter::F64 => FieldValue::F64(text().trim().parse().map_err(|e| bad(&e))?),
            // BIT arrives as raw bytes, other backends send "0"/"1".
            FieldFormatter::Flag => FieldValue::Flag(bytes.iter().any(|&b| b != 0 && b != b'0')),
            FieldFormatter::String => FieldValue::String(text().into_owned()),
            FieldFormatter::Angle | FieldFormatter::Array(_) => {
                return Err(StoreError::Unsupported(format!(
                    "retrieval of {:?} columns",
                    self
                )))
            }
        };
        Ok(value)
    }

    fn mismatch(&self, value: &FieldValue) -> StoreError {
        StoreError::TypeMismatch {
            field: String::new(),
            expected: format!("{:?}", self),
            found: value.kind().to_string(),
        }
    }
}

/// Pack array elements little-endian.
fn pack_array(value: &FieldValue) -> Option<Vec<u8>> {
    let bytes = match value {
        FieldValue::ArrayU16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        FieldValue::ArrayI32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        FieldValue::ArrayF32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        FieldValue::ArrayF64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        _ => return None,
    };
    Some(bytes)
}

/// Pack an array value for binding as a blob.
pub fn packed_array(value: &FieldValue) -> Option<Vec<u8>> {
    pack_array(value)
}

/// Render a float with `digits` significant digits, or `NULL` if not finite.
pub fn format_number(v: f64, digits: usize) -> String {
    if !v.is_finite() {
        return "NULL".to_string();
    }
    format_significant(v, digits)
}

/// Shortest `%.{digits}g` rendering of a finite float.
///
/// Scientific notation is used when the decimal exponent is below -4 or at
/// least `digits`; trailing zeros are removed in both notations.
pub fn format_significant(v: f64, digits: usize) -> String {
    let digits = digits.max(1);
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.*e}", digits - 1, v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= digits as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_trailing_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, v)).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_formatters() -> Vec<FieldFormatter> {
        vec![
            FieldFormatter::U16,
            FieldFormatter::I32,
            FieldFormatter::I64,
            FieldFormatter::F32,
            FieldFormatter::F64,
            FieldFormatter::Flag,
            FieldFormatter::Angle,
            FieldFormatter::String,
            FieldFormatter::Array(ArrayElement::U16),
            FieldFormatter::Array(ArrayElement::I32),
            FieldFormatter::Array(ArrayElement::F32),
            FieldFormatter::Array(ArrayElement::F64),
        ]
    }

    #[test]
    fn test_null_is_null_for_every_type() {
        for f in all_formatters() {
            assert_eq!(f.format_value(None).unwrap(), "NULL", "{:?}", f);
        }
    }

    #[test]
    fn test_unsupported_type_has_no_formatter() {
        assert!(FieldFormatter::for_type(&FieldType::Unsupported("B".into())).is_none());
        assert_eq!(
            FieldFormatter::for_type(&FieldType::Array(ArrayElement::F32)),
            Some(FieldFormatter::Array(ArrayElement::F32))
        );
    }

    #[test]
    fn test_scalar_sql_types() {
        let f = Field::new("x", FieldType::U16);
        assert_eq!(
            FieldFormatter::U16.sql_type(&f).unwrap(),
            "SMALLINT UNSIGNED NOT NULL"
        );
        assert_eq!(FieldFormatter::I32.sql_type(&f).unwrap(), "INT NOT NULL");
        assert_eq!(FieldFormatter::I64.sql_type(&f).unwrap(), "BIGINT NOT NULL");
        assert_eq!(FieldFormatter::F32.sql_type(&f).unwrap(), "FLOAT");
        assert_eq!(FieldFormatter::F64.sql_type(&f).unwrap(), "DOUBLE");
        assert_eq!(FieldFormatter::Angle.sql_type(&f).unwrap(), "DOUBLE");
        assert_eq!(FieldFormatter::Flag.sql_type(&f).unwrap(), "BIT NOT NULL");
    }

    #[test]
    fn test_string_sql_type() {
        let f = Field::sized("s", FieldType::String, 16);
        assert_eq!(
            FieldFormatter::String.sql_type(&f).unwrap(),
            "VARCHAR(16) CHARACTER SET ascii COLLATE ascii_bin NOT NULL"
        );

        let zero = Field::sized("s", FieldType::String, 0);
        let err = FieldFormatter::String.sql_type(&zero).unwrap_err();
        assert!(err.to_string().contains("zero size"));

        let huge = Field::sized("s", FieldType::String, 65536);
        assert!(FieldFormatter::String.sql_type(&huge).is_err());
    }

    #[test]
    fn test_array_sql_type() {
        let arr = FieldFormatter::Array(ArrayElement::F64);
        let f = Field::sized("a", FieldType::Array(ArrayElement::F64), 3);
        assert_eq!(arr.sql_type(&f).unwrap(), "BINARY(24) NOT NULL");

        let variable = Field::sized("a", FieldType::Array(ArrayElement::F64), 0);
        assert_eq!(arr.sql_type(&variable).unwrap(), "BLOB NOT NULL");

        let too_big = Field::sized("a", FieldType::Array(ArrayElement::F64), 8192);
        assert!(arr.sql_type(&too_big).is_err());
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(
            FieldFormatter::U16.format_value(Some(&FieldValue::U16(65535))).unwrap(),
            "65535"
        );
        assert_eq!(
            FieldFormatter::I64
                .format_value(Some(&FieldValue::I64(i64::MIN)))
                .unwrap(),
            "-9223372036854775808"
        );
    }

    #[test]
    fn test_non_finite_floats_are_null() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                FieldFormatter::F64.format_value(Some(&FieldValue::F64(v))).unwrap(),
                "NULL"
            );
            assert_eq!(
                FieldFormatter::F32
                    .format_value(Some(&FieldValue::F32(v as f32)))
                    .unwrap(),
                "NULL"
            );
            assert_eq!(
                FieldFormatter::Angle
                    .format_value(Some(&FieldValue::Angle(v)))
                    .unwrap(),
                "NULL"
            );
        }
    }

    #[test]
    fn test_float_literals_round_trip() {
        for v in [1.0, 1.5, 0.1, -2.5e-300, 6.02214076e23, 1.0 / 3.0, f64::MAX, f64::MIN_POSITIVE] {
            let s = FieldFormatter::F64.format_value(Some(&FieldValue::F64(v))).unwrap();
            assert_eq!(s.parse::<f64>().unwrap(), v, "{}", s);
        }
        for v in [1.0f32, 0.1, 3.1415927, -1.0e-20, f32::MAX] {
            let s = FieldFormatter::F32.format_value(Some(&FieldValue::F32(v))).unwrap();
            let back: f32 = s.parse().unwrap();
            assert!(((back - v) / v).abs() < 1e-6, "{} -> {}", v, s);
        }
    }

    #[test]
    fn test_format_significant_matches_printf_g() {
        assert_eq!(format_significant(1.0, 17), "1");
        assert_eq!(format_significant(1.5, 17), "1.5");
        assert_eq!(format_significant(100.0, 7), "100");
        assert_eq!(format_significant(1234567.0, 7), "1234567");
        assert_eq!(format_significant(12345678.0, 7), "1.234568e+07");
        assert_eq!(format_significant(0.0001, 7), "0.0001");
        assert_eq!(format_significant(0.00001, 7), "1e-05");
        assert_eq!(format_significant(0.1, 17), "0.10000000000000001");
        assert_eq!(format_significant(-0.0, 7), "-0");
        assert_eq!(format_significant(9.9999999, 7), "10");
    }

    #[test]
    fn test_angle_is_degrees() {
        let s = FieldFormatter::Angle
            .format_value(Some(&FieldValue::Angle(std::f64::consts::FRAC_PI_2)))
            .unwrap();
        let degrees: f64 = s.parse().unwrap();
        assert!((degrees - 90.0).abs() < 1e-12, "{}", s);
    }

    #[test]
    fn test_flag_literals() {
        assert_eq!(
            FieldFormatter::Flag.format_value(Some(&FieldValue::Flag(true))).unwrap(),
            "1"
        );
        assert_eq!(
            FieldFormatter::Flag.format_value(Some(&FieldValue::Flag(false))).unwrap(),
            "0"
        );
    }

    #[test]
    fn test_string_literal_escaping() {
        let s = FieldFormatter::String
            .format_value(Some(&FieldValue::String("it's a \\ test".into())))
            .unwrap();
        assert_eq!(s, "'it\\'s a \\\\ test'");
    }

    #[test]
    fn test_array_literal_little_endian_hex() {
        let s = FieldFormatter::Array(ArrayElement::U16)
            .format_value(Some(&FieldValue::ArrayU16(vec![1, 0x0203])))
            .unwrap();
        assert_eq!(s, "x'01000302'");

        let s = FieldFormatter::Array(ArrayElement::F64)
            .format_value(Some(&FieldValue::ArrayF64(vec![1.0])))
            .unwrap();
        assert_eq!(s, "x'000000000000f03f'");
    }

    #[test]
    fn test_mismatched_value_is_error() {
        let err = FieldFormatter::I32
            .format_value(Some(&FieldValue::F64(1.0)))
            .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert!(FieldFormatter::Array(ArrayElement::I32)
            .format_value(Some(&FieldValue::I32(1)))
            .is_err());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(
            FieldFormatter::F64.parse_text(b"1.5").unwrap(),
            FieldValue::F64(1.5)
        );
        assert_eq!(
            FieldFormatter::U16.parse_text(b"7").unwrap(),
            FieldValue::U16(7)
        );
        assert_eq!(
            FieldFormatter::Flag.parse_text(&[1]).unwrap(),
            FieldValue::Flag(true)
        );
        assert_eq!(
            FieldFormatter::Flag.parse_text(b"0").unwrap(),
            FieldValue::Flag(false)
        );
        assert!(FieldFormatter::I32.parse_text(b"abc").is_err());
        assert!(FieldFormatter::Angle.parse_text(b"1").is_err());
    }
}
