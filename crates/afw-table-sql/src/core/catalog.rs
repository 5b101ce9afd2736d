//! In-memory catalogs and their JSON document form.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Result, StoreError};

use super::schema::Schema;
use super::value::{FieldValue, Record};

/// An ordered collection of records sharing one schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    schema: Schema,
    records: Vec<Record>,
}

impl Catalog {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Append a record after checking its arity, value types, and sizes.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if record.len() != self.schema.len() {
            return Err(StoreError::Config(format!(
                "Record has {} values but schema has {} fields",
                record.len(),
                self.schema.len()
            )));
        }
        for (field, value) in self.schema.fields.iter().zip(&record) {
            if let Some(value) = value {
                if !value.matches(&field.field_type) {
                    return Err(StoreError::TypeMismatch {
                        field: field.name.clone(),
                        expected: field.field_type.to_string(),
                        found: value.kind().to_string(),
                    });
                }
                value.check_size(field)?;
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Convert to the JSON document form.
    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            schema: self.schema.clone(),
            records: self
                .records
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|v| v.as_ref().map_or(JsonValue::Null, FieldValue::to_json))
                        .collect()
                })
                .collect(),
        }
    }
}

/// Serializable form of a catalog: schema plus records as JSON arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub schema: Schema,
    #[serde(default)]
    pub records: Vec<Vec<JsonValue>>,
}

impl CatalogDocument {
    /// Parse a JSON document from a file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build a typed catalog, converting every value by its field's type.
    pub fn into_catalog(self) -> Result<Catalog> {
        let mut catalog = Catalog::new(self.schema);
        for (idx, row) in self.records.iter().enumerate() {
            if row.len() != catalog.schema.len() {
                return Err(StoreError::Config(format!(
                    "Record {} has {} values but schema has {} fields",
                    idx,
                    row.len(),
                    catalog.schema.len()
                )));
            }
            let record = catalog
                .schema
                .fields
                .iter()
                .zip(row)
                .map(|(field, json)| FieldValue::from_json(field, json))
                .collect::<Result<Record>>()?;
            catalog.push(record)?;
        }
        Ok(catalog)
    }
}
