//! Schema translation: catalog schemas to table DDL, view DDL, and column lists.

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::IngestConfig;
use crate::core::identifier::{canonicalize_field_name, quote_mysql};
use crate::core::{aliases_for, Field, Record, Schema};
use crate::error::{Result, StoreError};
use crate::format::FieldFormatter;

/// One persisted column and the field it comes from.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Position of the field in the schema (and in every record).
    pub field_index: usize,
    pub field: Field,
    /// Unquoted column name.
    pub column: String,
    pub formatter: FieldFormatter,
}

/// Column layout of a catalog table under an ingest configuration.
#[derive(Debug, Clone)]
pub struct TableLayout {
    columns: Vec<ColumnSpec>,
    unique_column: Option<String>,
    extra_columns: Option<String>,
    allow_replace: bool,
}

/// Column name for a field: its remap entry, or its canonical form.
pub fn column_name(field_name: &str, ingest: &IngestConfig) -> String {
    match ingest.remap.get(field_name) {
        Some(column) => column.clone(),
        None => canonicalize_field_name(field_name),
    }
}

impl TableLayout {
    /// Select the ingestible fields of a schema and check their names.
    ///
    /// Fields of unsupported types and fields whose column name exceeds
    /// `max_column_len` are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NameCollision`] listing every group of fields
    /// whose column names are equal ignoring case.
    pub fn build(schema: &Schema, ingest: &IngestConfig) -> Result<Self> {
        let mut columns = Vec::with_capacity(schema.len());
        for (field_index, field) in schema.fields.iter().enumerate() {
            let Some(formatter) = FieldFormatter::for_type(&field.field_type) else {
                warn!(
                    "Skipping field {}: type {} not supported",
                    field.name, field.field_type
                );
                continue;
            };
            let column = column_name(&field.name, ingest);
            if column.len() > ingest.max_column_len {
                warn!(
                    "Skipping field {}: column name {} too long",
                    field.name, column
                );
                continue;
            }
            columns.push(ColumnSpec {
                field_index,
                field: field.clone(),
                column,
                formatter,
            });
        }

        check_collisions(&columns)?;

        let unique_column = match &ingest.id_field_name {
            Some(id) => match columns.iter().find(|c| &c.field.name == id) {
                Some(c) => Some(c.column.clone()),
                None => {
                    warn!(
                        "No field matches the configured unique ID field name ({})",
                        id
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            columns,
            unique_column,
            extra_columns: ingest
                .extra_columns
                .as_ref()
                .filter(|s| !s.trim().is_empty())
                .cloned(),
            allow_replace: ingest.allow_replace,
        })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// `CREATE TABLE` statement for the given (unquoted) table name.
    pub fn create_table_sql(&self, table: &str) -> Result<String> {
        let mut defs = Vec::with_capacity(self.columns.len() + 2);
        for c in &self.columns {
            defs.push(format!(
                "{} {}",
                quote_mysql(&c.column)?,
                c.formatter.sql_type(&c.field)?
            ));
        }
        if let Some(extra) = &self.extra_columns {
            defs.push(extra.clone());
        }
        if let Some(unique) = &self.unique_column {
            defs.push(format!("UNIQUE({})", quote_mysql(unique)?));
        }
        Ok(format!(
            "CREATE TABLE {} (\n\t{}\n)",
            quote_mysql(table)?,
            defs.join(",\n\t")
        ))
    }

    /// `INSERT INTO t (cols) VALUES ` or its `REPLACE` form.
    pub fn insert_prefix(&self, table: &str) -> Result<String> {
        let verb = if self.allow_replace { "REPLACE" } else { "INSERT" };
        let cols = self
            .columns
            .iter()
            .map(|c| quote_mysql(&c.column))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "{} INTO {} ({}) VALUES ",
            verb,
            quote_mysql(table)?,
            cols.join(",")
        ))
    }

    /// Parenthesized value tuple of one record.
    pub fn row_literal(&self, record: &Record) -> Result<String> {
        let mut values = Vec::with_capacity(self.columns.len());
        for c in &self.columns {
            let value = record.get(c.field_index).and_then(Option::as_ref);
            let literal = c.formatter.format_value(value).map_err(|e| match e {
                StoreError::TypeMismatch {
                    expected, found, ..
                } => StoreError::TypeMismatch {
                    field: c.field.name.clone(),
                    expected,
                    found,
                },
                other => other,
            })?;
            values.push(literal);
        }
        Ok(format!("({})", values.join(",")))
    }

    /// View exposing every column of `table` plus one `column AS alias` per alias.
    ///
    /// Aliases whose column name exceeds `max_column_len` are skipped with a
    /// warning.
    pub fn view_sql(
        &self,
        view: &str,
        table: &str,
        schema: &Schema,
        ingest: &IngestConfig,
    ) -> Result<String> {
        let mappings = schema.alias_pairs();
        let mut projection = vec!["*".to_string()];
        for c in &self.columns {
            for alias in aliases_for(&c.field.name, &mappings) {
                let alias_column = column_name(&alias, ingest);
                if alias_column.len() > ingest.max_column_len {
                    warn!(
                        "Skipping alias {} for {}: alias too long",
                        alias_column, c.column
                    );
                    continue;
                }
                projection.push(format!(
                    "{} AS {}",
                    quote_mysql(&c.column)?,
                    quote_mysql(&alias_column)?
                ));
            }
        }
        Ok(format!(
            "CREATE OR REPLACE ALGORITHM = MERGE SQL SECURITY INVOKER VIEW {} AS SELECT\n\t{}\nFROM {}",
            quote_mysql(view)?,
            projection.join(",\n\t"),
            quote_mysql(table)?
        ))
    }
}

fn check_collisions(columns: &[ColumnSpec]) -> Result<()> {
    let mut classes: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for c in columns {
        classes
            .entry(c.column.to_lowercase())
            .or_default()
            .push(&c.field.name);
    }
    let clashes: Vec<String> = classes
        .values()
        .filter(|names| names.len() > 1)
        .map(|names| format!("\t{{{}}}", names.join(", ")))
        .collect();
    if clashes.is_empty() {
        Ok(())
    } else {
        Err(StoreError::NameCollision(clashes.join(",\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArrayElement, FieldType, FieldValue};

    fn schema(fields: &[(&str, FieldType, usize)]) -> Schema {
        let mut s = Schema::new();
        for (name, ty, size) in fields {
            s.add_field(Field::sized(*name, ty.clone(), *size)).unwrap();
        }
        s
    }

    #[test]
    fn test_create_table() {
        let s = schema(&[
            ("id", FieldType::I64, 0),
            ("coord.ra", FieldType::Angle, 0),
            ("name", FieldType::String, 8),
        ]);
        let layout = TableLayout::build(&s, &IngestConfig::default()).unwrap();
        assert_eq!(
            layout.create_table_sql("tmp_1").unwrap(),
            "CREATE TABLE `tmp_1` (\n\t`id` BIGINT NOT NULL,\n\t`coord_ra` DOUBLE,\n\t\
             `name` VARCHAR(8) CHARACTER SET ascii COLLATE ascii_bin NOT NULL\n)"
        );
    }

    #[test]
    fn test_unsupported_and_long_fields_skipped() {
        let long = "x".repeat(65);
        let s = schema(&[
            ("a", FieldType::F64, 0),
            ("b", FieldType::Unsupported("B".into()), 0),
            (long.as_str(), FieldType::I32, 0),
            ("c", FieldType::I32, 0),
        ]);
        let layout = TableLayout::build(&s, &IngestConfig::default()).unwrap();
        let names: Vec<_> = layout.columns().iter().map(|c| c.column.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(layout.columns()[1].field_index, 3);
    }

    #[test]
    fn test_collision_detected_before_ddl() {
        let s = schema(&[
            ("a.b", FieldType::F64, 0),
            ("a-b", FieldType::F64, 0),
            ("X", FieldType::I32, 0),
            ("x", FieldType::I32, 0),
            ("ok", FieldType::I32, 0),
        ]);
        let err = TableLayout::build(&s, &IngestConfig::default()).unwrap_err();
        let StoreError::NameCollision(groups) = &err else {
            panic!("expected collision, got {:?}", err);
        };
        assert!(groups.contains("{a.b, a-b}"));
        assert!(groups.contains("{X, x}"));
        assert!(!groups.contains("ok"));
    }

    #[test]
    fn test_remap_resolves_collision() {
        let s = schema(&[("a.b", FieldType::F64, 0), ("a-b", FieldType::F64, 0)]);
        let mut ingest = IngestConfig::default();
        ingest.remap.insert("a-b".into(), "a_minus_b".into());
        let layout = TableLayout::build(&s, &ingest).unwrap();
        assert_eq!(layout.columns()[1].column, "a_minus_b");
    }

    #[test]
    fn test_unique_and_extra_columns() {
        let s = schema(&[("id", FieldType::I64, 0), ("flux", FieldType::F64, 0)]);
        let mut ingest = IngestConfig::default();
        ingest.id_field_name = Some("id".into());
        ingest.extra_columns = Some("htmId20 BIGINT NOT NULL".into());
        let layout = TableLayout::build(&s, &ingest).unwrap();
        let sql = layout.create_table_sql("t").unwrap();
        assert!(sql.ends_with(",\n\thtmId20 BIGINT NOT NULL,\n\tUNIQUE(`id`)\n)"), "{}", sql);
    }

    #[test]
    fn test_missing_unique_field_is_not_fatal() {
        let s = schema(&[("flux", FieldType::F64, 0)]);
        let mut ingest = IngestConfig::default();
        ingest.id_field_name = Some("id".into());
        let layout = TableLayout::build(&s, &ingest).unwrap();
        assert!(!layout.create_table_sql("t").unwrap().contains("UNIQUE"));
    }

    #[test]
    fn test_zero_size_string_fails_at_ddl() {
        let s = schema(&[("s", FieldType::String, 0)]);
        let layout = TableLayout::build(&s, &IngestConfig::default()).unwrap();
        assert!(layout.create_table_sql("t").is_err());
    }

    #[test]
    fn test_insert_prefix() {
        let s = schema(&[("a", FieldType::F64, 0), ("b.c", FieldType::I32, 0)]);
        let mut ingest = IngestConfig::default();
        let layout = TableLayout::build(&s, &ingest).unwrap();
        assert_eq!(
            layout.insert_prefix("t").unwrap(),
            "INSERT INTO `t` (`a`,`b_c`) VALUES "
        );
        ingest.allow_replace = true;
        let layout = TableLayout::build(&s, &ingest).unwrap();
        assert!(layout.insert_prefix("t").unwrap().starts_with("REPLACE INTO"));
    }

    #[test]
    fn test_row_literal() {
        let s = schema(&[
            ("a", FieldType::F64, 0),
            ("skip", FieldType::Unsupported("B".into()), 0),
            ("arr", FieldType::Array(ArrayElement::U16), 1),
        ]);
        let layout = TableLayout::build(&s, &IngestConfig::default()).unwrap();
        let row = vec![Some(FieldValue::F64(1.5)), None, Some(FieldValue::ArrayU16(vec![1]))];
        assert_eq!(layout.row_literal(&row).unwrap(), "(1.5,x'0100')");
        let nulls = vec![None, None, None];
        assert_eq!(layout.row_literal(&nulls).unwrap(), "(NULL,NULL)");
    }

    #[test]
    fn test_row_literal_mismatch_names_field() {
        let s = schema(&[("a", FieldType::F64, 0)]);
        let layout = TableLayout::build(&s, &IngestConfig::default()).unwrap();
        let err = layout.row_literal(&vec![Some(FieldValue::I32(1))]).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { ref field, .. } if field == "a"));
    }

    #[test]
    fn test_view_sql() {
        let mut s = schema(&[("new_x", FieldType::F64, 0), ("other", FieldType::I32, 0)]);
        s.set_alias("old_", "new_");
        let ingest = IngestConfig::default();
        let layout = TableLayout::build(&s, &ingest).unwrap();
        assert_eq!(
            layout.view_sql("v", "t", &s, &ingest).unwrap(),
            "CREATE OR REPLACE ALGORITHM = MERGE SQL SECURITY INVOKER VIEW `v` AS SELECT\n\t*,\n\t\
             `new_x` AS `old_x`\nFROM `t`"
        );
    }

    #[test]
    fn test_view_skips_long_aliases() {
        let mut s = schema(&[("n_x", FieldType::F64, 0)]);
        s.set_alias(format!("{}_", "o".repeat(70)), "n_");
        let ingest = IngestConfig::default();
        let layout = TableLayout::build(&s, &ingest).unwrap();
        let sql = layout.view_sql("v", "t", &s, &ingest).unwrap();
        assert!(sql.ends_with("AS SELECT\n\t*\nFROM `t`"));
        assert!(!sql.contains("` AS `"));
    }
}
