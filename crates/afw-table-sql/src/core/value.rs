//! Typed field values and their JSON form.

use serde_json::Value as JsonValue;

use crate::error::{Result, StoreError};

use super::schema::{ArrayElement, Field, FieldType};

/// A typed value of one catalog field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U16(u16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Flag(bool),
    /// Angle in radians.
    Angle(f64),
    String(String),
    ArrayU16(Vec<u16>),
    ArrayI32(Vec<i32>),
    ArrayF32(Vec<f32>),
    ArrayF64(Vec<f64>),
}

/// One catalog row. `None` is the null marker.
pub type Record = Vec<Option<FieldValue>>;

impl FieldValue {
    /// Short name of the value's variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::U16(_) => "U16",
            FieldValue::I32(_) => "I32",
            FieldValue::I64(_) => "I64",
            FieldValue::F32(_) => "F32",
            FieldValue::F64(_) => "F64",
            FieldValue::Flag(_) => "Flag",
            FieldValue::Angle(_) => "Angle",
            FieldValue::String(_) => "String",
            FieldValue::ArrayU16(_) => "ArrayU16",
            FieldValue::ArrayI32(_) => "ArrayI32",
            FieldValue::ArrayF32(_) => "ArrayF32",
            FieldValue::ArrayF64(_) => "ArrayF64",
        }
    }

    /// Whether this value may be stored in a field of the given type.
    pub fn matches(&self, ty: &FieldType) -> bool {
        matches!(
            (self, ty),
            (FieldValue::U16(_), FieldType::U16)
                | (FieldValue::I32(_), FieldType::I32)
                | (FieldValue::I64(_), FieldType::I64)
                | (FieldValue::F32(_), FieldType::F32)
                | (FieldValue::F64(_), FieldType::F64)
                | (FieldValue::Flag(_), FieldType::Flag)
                | (FieldValue::Angle(_), FieldType::Angle)
                | (FieldValue::String(_), FieldType::String)
                | (FieldValue::ArrayU16(_), FieldType::Array(ArrayElement::U16))
                | (FieldValue::ArrayI32(_), FieldType::Array(ArrayElement::I32))
                | (FieldValue::ArrayF32(_), FieldType::Array(ArrayElement::F32))
                | (FieldValue::ArrayF64(_), FieldType::Array(ArrayElement::F64))
        )
    }

    /// Check the value against the field's declared size.
    ///
    /// Sized strings are ASCII and at most `size` bytes long. Sized arrays
    /// hold exactly `size` elements. A size of zero is unconstrained.
    pub fn check_size(&self, field: &Field) -> Result<()> {
        if field.size == 0 {
            return Ok(());
        }
        let reason = match self {
            FieldValue::String(v) if !v.is_ascii() => {
                Some("string value is not ASCII".to_string())
            }
            FieldValue::String(v) if v.len() > field.size => Some(format!(
                "string of length {} exceeds declared size {}",
                v.len(),
                field.size
            )),
            _ => self
                .array_len()
                .filter(|len| *len != field.size)
                .map(|len| {
                    format!(
                        "array of {} elements does not match declared size {}",
                        len, field.size
                    )
                }),
        };
        match reason {
            Some(reason) => Err(StoreError::invalid_field(&field.name, reason)),
            None => Ok(()),
        }
    }

    fn array_len(&self) -> Option<usize> {
        match self {
            FieldValue::ArrayU16(v) => Some(v.len()),
            FieldValue::ArrayI32(v) => Some(v.len()),
            FieldValue::ArrayF32(v) => Some(v.len()),
            FieldValue::ArrayF64(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Convert a JSON value into a value of the field's type.
    ///
    /// JSON `null` yields `None`. Angles are read as radians.
    pub fn from_json(field: &Field, json: &JsonValue) -> Result<Option<Self>> {
        if json.is_null() {
            return Ok(None);
        }
        let mismatch = || StoreError::TypeMismatch {
            field: field.name.clone(),
            expected: field.field_type.to_string(),
            found: json.to_string(),
        };

        let value = match &field.field_type {
            FieldType::U16 => FieldValue::U16(
                json.as_u64()
                    .and_then(|v| u16::try_from(v).ok())
                    .ok_or_else(mismatch)?,
            ),
            FieldType::I32 => FieldValue::I32(
                json.as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(mismatch)?,
            ),
            FieldType::I64 => FieldValue::I64(json.as_i64().ok_or_else(mismatch)?),
            FieldType::F32 => FieldValue::F32(json_float(json).ok_or_else(mismatch)? as f32),
            FieldType::F64 => FieldValue::F64(json_float(json).ok_or_else(mismatch)?),
            FieldType::Angle => FieldValue::Angle(json_float(json).ok_or_else(mismatch)?),
            FieldType::Flag => FieldValue::Flag(json.as_bool().ok_or_else(mismatch)?),
            FieldType::String => {
                FieldValue::String(json.as_str().ok_or_else(mismatch)?.to_string())
            }
            FieldType::Array(element) => {
                let items = json.as_array().ok_or_else(mismatch)?;
                match element {
                    ArrayElement::U16 => FieldValue::ArrayU16(
                        items
                            .iter()
                            .map(|v| v.as_u64().and_then(|v| u16::try_from(v).ok()))
                            .collect::<Option<_>>()
                            .ok_or_else(mismatch)?,
                    ),
                    ArrayElement::I32 => FieldValue::ArrayI32(
                        items
                            .iter()
                            .map(|v| v.as_i64().and_then(|v| i32::try_from(v).ok()))
                            .collect::<Option<_>>()
                            .ok_or_else(mismatch)?,
                    ),
                    ArrayElement::F32 => FieldValue::ArrayF32(
                        items
                            .iter()
                            .map(|v| json_float(v).map(|f| f as f32))
                            .collect::<Option<_>>()
                            .ok_or_else(mismatch)?,
                    ),
                    ArrayElement::F64 => FieldValue::ArrayF64(
                        items
                            .iter()
                            .map(json_float)
                            .collect::<Option<_>>()
                            .ok_or_else(mismatch)?,
                    ),
                }
            }
            FieldType::Unsupported(tag) => {
                return Err(StoreError::Unsupported(format!(
                    "values of type {} for field {}",
                    tag, field.name
                )))
            }
        };
        Ok(Some(value))
    }

    /// JSON form of this value. Non-finite floats become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::U16(v) => JsonValue::from(*v),
            FieldValue::I32(v) => JsonValue::from(*v),
            FieldValue::I64(v) => JsonValue::from(*v),
            FieldValue::F32(v) => float_json(f64::from(*v)),
            FieldValue::F64(v) | FieldValue::Angle(v) => float_json(*v),
            FieldValue::Flag(v) => JsonValue::from(*v),
            FieldValue::String(v) => JsonValue::from(v.as_str()),
            FieldValue::ArrayU16(v) => JsonValue::from(v.clone()),
            FieldValue::ArrayI32(v) => JsonValue::from(v.clone()),
            FieldValue::ArrayF32(v) => {
                JsonValue::Array(v.iter().map(|f| float_json(f64::from(*f))).collect())
            }
            FieldValue::ArrayF64(v) => JsonValue::Array(v.iter().map(|f| float_json(*f)).collect()),
        }
    }
}

fn json_float(json: &JsonValue) -> Option<f64> {
    json.as_f64()
}

fn float_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        let f = Field::new("a", FieldType::I32);
        assert_eq!(
            FieldValue::from_json(&f, &json!(7)).unwrap(),
            Some(FieldValue::I32(7))
        );
        assert_eq!(FieldValue::from_json(&f, &json!(null)).unwrap(), None);
        assert!(FieldValue::from_json(&f, &json!("7")).is_err());
        assert!(FieldValue::from_json(&f, &json!(1i64 << 40)).is_err());

        let u = Field::new("u", FieldType::U16);
        assert!(FieldValue::from_json(&u, &json!(-1)).is_err());
        assert!(FieldValue::from_json(&u, &json!(70000)).is_err());
    }

    #[test]
    fn test_from_json_float_accepts_integers() {
        let f = Field::new("x", FieldType::F64);
        assert_eq!(
            FieldValue::from_json(&f, &json!(1)).unwrap(),
            Some(FieldValue::F64(1.0))
        );
    }

    #[test]
    fn test_from_json_arrays() {
        let f = Field::sized("arr", FieldType::Array(ArrayElement::I32), 3);
        assert_eq!(
            FieldValue::from_json(&f, &json!([1, -2, 3])).unwrap(),
            Some(FieldValue::ArrayI32(vec![1, -2, 3]))
        );
        assert!(FieldValue::from_json(&f, &json!([1, "x"])).is_err());
    }

    #[test]
    fn test_check_size_strings() {
        let f = Field::sized("name", FieldType::String, 4);
        assert!(FieldValue::String("abcd".into()).check_size(&f).is_ok());
        assert!(FieldValue::String(String::new()).check_size(&f).is_ok());
        let err = FieldValue::String("abcde".into()).check_size(&f).unwrap_err();
        assert!(matches!(err, StoreError::InvalidField { ref field, .. } if field == "name"));
        assert!(FieldValue::String("caf\u{e9}".into()).check_size(&f).is_err());

        let unsized_field = Field::new("note", FieldType::String);
        assert!(FieldValue::String("caf\u{e9} au lait".into())
            .check_size(&unsized_field)
            .is_ok());
    }

    #[test]
    fn test_check_size_arrays() {
        let f = Field::sized("pos", FieldType::Array(ArrayElement::F64), 3);
        assert!(FieldValue::ArrayF64(vec![1.0, 2.0, 3.0]).check_size(&f).is_ok());
        assert!(FieldValue::ArrayF64(vec![1.0]).check_size(&f).is_err());
        assert!(FieldValue::ArrayF64(vec![0.0; 4]).check_size(&f).is_err());

        let variable = Field::new("samples", FieldType::Array(ArrayElement::F64));
        assert!(FieldValue::ArrayF64(vec![1.0]).check_size(&variable).is_ok());
        assert!(FieldValue::I32(7).check_size(&f).is_ok());
    }

    #[test]
    fn test_from_json_unsupported() {
        let f = Field::new("b", FieldType::Unsupported("B".into()));
        let err = FieldValue::from_json(&f, &json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[test]
    fn test_to_json_non_finite_is_null() {
        assert_eq!(FieldValue::F64(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(FieldValue::F64(1.5).to_json(), json!(1.5));
        assert_eq!(
            FieldValue::ArrayF32(vec![1.0, f32::INFINITY]).to_json(),
            json!([1.0, null])
        );
    }

    #[test]
    fn test_matches() {
        assert!(FieldValue::Flag(true).matches(&FieldType::Flag));
        assert!(!FieldValue::F64(1.0).matches(&FieldType::Angle));
        assert!(FieldValue::ArrayU16(vec![]).matches(&FieldType::Array(ArrayElement::U16)));
    }
}
