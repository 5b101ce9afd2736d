//! Catalog tables through the `sqlx` Any driver.
//!
//! Column types are chosen from the small set both SQLite and MySQL accept
//! and report back distinctly (`INT4`, `INT8`, `FLOAT4`, `FLOAT8`,
//! `BOOLEAN`, `VARCHAR`, `BLOB`). Values are bound as statement parameters.

use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row, TypeInfo};

use crate::core::{Catalog, Field, FieldType, FieldValue, Record, Schema};
use crate::error::{Result, StoreError};
use crate::format::{packed_array, FieldFormatter};
use crate::ingest::TableLayout;

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Portable column type for a field.
pub fn column_type(formatter: FieldFormatter, field: &Field) -> String {
    match formatter {
        FieldFormatter::U16 | FieldFormatter::I32 => "INT4".to_string(),
        FieldFormatter::I64 => "INT8".to_string(),
        FieldFormatter::F32 => "FLOAT4".to_string(),
        FieldFormatter::F64 | FieldFormatter::Angle => "FLOAT8".to_string(),
        FieldFormatter::Flag => "BOOLEAN".to_string(),
        FieldFormatter::String if field.size > 0 => format!("VARCHAR({})", field.size),
        FieldFormatter::String => "TEXT".to_string(),
        FieldFormatter::Array(_) => "BLOB".to_string(),
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a layout, with identifiers quoted by `quote`.
pub fn create_table_sql(
    layout: &TableLayout,
    table: &str,
    quote: impl Fn(&str) -> Result<String>,
) -> Result<String> {
    if layout.columns().is_empty() {
        return Err(StoreError::Config(format!(
            "Catalog for {} has no storable fields",
            table
        )));
    }
    let defs = layout
        .columns()
        .iter()
        .map(|c| Ok(format!("{} {}", quote(&c.column)?, column_type(c.formatter, &c.field))))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n\t{}\n)",
        quote(table)?,
        defs.join(",\n\t")
    ))
}

/// Parameterized single-row `INSERT` for a layout.
pub fn insert_sql(
    layout: &TableLayout,
    table: &str,
    quote: impl Fn(&str) -> Result<String>,
) -> Result<String> {
    let cols = layout
        .columns()
        .iter()
        .map(|c| quote(&c.column))
        .collect::<Result<Vec<_>>>()?;
    let params = vec!["?"; cols.len()].join(", ");
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table)?,
        cols.join(", "),
        params
    ))
}

fn finite32(v: f32) -> Option<f32> {
    v.is_finite().then_some(v)
}

fn finite64(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Bind one value, or a typed NULL for `None`.
pub(crate) fn bind_value<'q>(
    query: AnyQuery<'q>,
    field: &Field,
    value: Option<&FieldValue>,
) -> Result<AnyQuery<'q>> {
    let query = match value {
        Some(FieldValue::U16(v)) => query.bind(i32::from(*v)),
        Some(FieldValue::I32(v)) => query.bind(*v),
        Some(FieldValue::I64(v)) => query.bind(*v),
        Some(FieldValue::F32(v)) => query.bind(finite32(*v)),
        Some(FieldValue::F64(v)) => query.bind(finite64(*v)),
        Some(FieldValue::Angle(v)) => query.bind(finite64(v.to_degrees())),
        Some(FieldValue::Flag(v)) => query.bind(*v),
        Some(FieldValue::String(v)) => query.bind(v.clone()),
        Some(array) => query.bind(packed_array(array).unwrap_or_default()),
        None => match &field.field_type {
            FieldType::U16 | FieldType::I32 => query.bind(None::<i32>),
            FieldType::I64 => query.bind(None::<i64>),
            FieldType::F32 => query.bind(None::<f32>),
            FieldType::F64 | FieldType::Angle => query.bind(None::<f64>),
            FieldType::Flag => query.bind(None::<bool>),
            FieldType::String => query.bind(None::<String>),
            FieldType::Array(_) => query.bind(None::<Vec<u8>>),
            FieldType::Unsupported(tag) => {
                return Err(StoreError::invalid_field(
                    &field.name,
                    format!("type {} cannot be stored", tag),
                ))
            }
        },
    };
    Ok(query)
}

/// Field type for a column reported by the Any driver.
fn field_type_for(column: &str, type_name: &str) -> Result<FieldType> {
    match type_name {
        "SMALLINT" | "INTEGER" => Ok(FieldType::I32),
        "BIGINT" => Ok(FieldType::I64),
        "REAL" => Ok(FieldType::F32),
        "DOUBLE" => Ok(FieldType::F64),
        "BOOLEAN" => Ok(FieldType::Flag),
        "TEXT" => Ok(FieldType::String),
        other => Err(StoreError::Unsupported(format!(
            "column {} of type {} cannot be read into a catalog",
            column, other
        ))),
    }
}

fn decode_value(row: &AnyRow, index: usize, field: &Field) -> Result<Option<FieldValue>> {
    let value = match field.field_type {
        FieldType::I32 => row
            .try_get::<Option<i64>, _>(index)?
            .map(|v| {
                i32::try_from(v).map(FieldValue::I32).map_err(|_| StoreError::TypeMismatch {
                    field: field.name.clone(),
                    expected: "I".to_string(),
                    found: v.to_string(),
                })
            })
            .transpose()?,
        FieldType::I64 => row.try_get::<Option<i64>, _>(index)?.map(FieldValue::I64),
        FieldType::F32 => row.try_get::<Option<f32>, _>(index)?.map(FieldValue::F32),
        FieldType::F64 => row.try_get::<Option<f64>, _>(index)?.map(FieldValue::F64),
        FieldType::Flag => {
            // SQLite hands booleans back as integers.
            let flag = match row.try_get::<Option<bool>, _>(index) {
                Ok(v) => v,
                Err(_) => row.try_get::<Option<i64>, _>(index)?.map(|n| n != 0),
            };
            flag.map(FieldValue::Flag)
        }
        FieldType::String => row.try_get::<Option<String>, _>(index)?.map(FieldValue::String),
        FieldType::U16 | FieldType::Angle | FieldType::Array(_) | FieldType::Unsupported(_) => {
            return Err(StoreError::Unsupported(format!(
                "reading {} columns",
                field.field_type
            )))
        }
    };
    Ok(value)
}

/// Rebuild a catalog from fetched rows.
///
/// Column types come from the first row; no rows yields an empty catalog.
pub fn catalog_from_rows(rows: &[AnyRow]) -> Result<Catalog> {
    let Some(first) = rows.first() else {
        return Ok(Catalog::new(Schema::new()));
    };

    let mut schema = Schema::new();
    for column in first.columns() {
        let field_type = field_type_for(column.name(), column.type_info().name())?;
        schema.add_field(Field::new(column.name(), field_type))?;
    }

    let mut catalog = Catalog::new(schema);
    for row in rows {
        let record = catalog
            .schema()
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| decode_value(row, i, field))
            .collect::<Result<Record>>()?;
        catalog.push(record)?;
    }
    Ok(catalog)
}
