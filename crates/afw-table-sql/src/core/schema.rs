//! Schema types for catalogs: fields, their type tags, and the alias map.
//!
//! A schema is an ordered list of fields (insertion order is the persisted
//! column order) plus the rename history used to build alias views.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Element type of a fixed-size array field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayElement {
    U16,
    I32,
    F32,
    F64,
}

impl ArrayElement {
    /// Width of one packed little-endian element in bytes.
    pub fn width(self) -> usize {
        match self {
            ArrayElement::U16 => 2,
            ArrayElement::I32 | ArrayElement::F32 => 4,
            ArrayElement::F64 => 8,
        }
    }
}

/// Column type of a catalog field.
///
/// Parsed from the catalog library's type tags. Tags that are known but
/// cannot be persisted parse to [`FieldType::Unsupported`] and are skipped
/// during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    U16,
    I32,
    I64,
    F32,
    F64,
    Flag,
    /// Angle in radians; persisted as degrees.
    Angle,
    /// Fixed-size string; `Field::size` is the maximum length.
    String,
    /// Fixed-size array; `Field::size` is the element count (0 = variable).
    Array(ArrayElement),
    Unsupported(String),
}

impl FieldType {
    /// Parse a catalog type tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let ty = match tag {
            "U" => FieldType::U16,
            "I" => FieldType::I32,
            "L" => FieldType::I64,
            "F" => FieldType::F32,
            "D" => FieldType::F64,
            "Flag" => FieldType::Flag,
            "Angle" => FieldType::Angle,
            "String" => FieldType::String,
            "ArrayU" => FieldType::Array(ArrayElement::U16),
            "ArrayI" => FieldType::Array(ArrayElement::I32),
            "ArrayF" => FieldType::Array(ArrayElement::F32),
            "ArrayD" => FieldType::Array(ArrayElement::F64),
            "B" | "ArrayB" => FieldType::Unsupported(tag.to_string()),
            other => {
                return Err(StoreError::Config(format!(
                    "Unknown field type tag: {:?}",
                    other
                )))
            }
        };
        Ok(ty)
    }

    /// The catalog type tag of this type.
    pub fn tag(&self) -> &str {
        match self {
            FieldType::U16 => "U",
            FieldType::I32 => "I",
            FieldType::I64 => "L",
            FieldType::F32 => "F",
            FieldType::F64 => "D",
            FieldType::Flag => "Flag",
            FieldType::Angle => "Angle",
            FieldType::String => "String",
            FieldType::Array(ArrayElement::U16) => "ArrayU",
            FieldType::Array(ArrayElement::I32) => "ArrayI",
            FieldType::Array(ArrayElement::F32) => "ArrayF",
            FieldType::Array(ArrayElement::F64) => "ArrayD",
            FieldType::Unsupported(tag) => tag,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for FieldType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        FieldType::from_tag(&tag).map_err(serde::de::Error::custom)
    }
}

/// A named, typed field of a catalog schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// String length or array element count. Ignored for scalar types.
    #[serde(default)]
    pub size: usize,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            size: 0,
        }
    }

    pub fn sized(name: impl Into<String>, field_type: FieldType, size: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            size,
        }
    }
}

/// Ordered fields plus the alias map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,

    /// Rename map: alias prefix -> target prefix. Kept sorted by alias.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Exactly duplicated names are rejected.
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        if self.fields.iter().any(|f| f.name == field.name) {
            return Err(StoreError::invalid_field(
                field.name,
                "field already present in schema",
            ));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Builder-style [`Schema::add_field`].
    pub fn with_field(mut self, field: Field) -> Result<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    /// Record that names starting with `alias` now start with `target`.
    pub fn set_alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Rename pairs `(alias, target)` sorted by alias.
    pub fn alias_pairs(&self) -> Vec<(String, String)> {
        self.aliases
            .iter()
            .map(|(a, t)| (a.clone(), t.clone()))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
