//! Catalog reader/writer for MySQL.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{ConnectionConfig, IngestConfig};
use crate::core::identifier::quote_mysql;
use crate::core::{
    Catalog, Field, FieldType, Location, ObjectFormatter, Record, ResultSet, Schema, SqlSession,
    SqlType, StoredObject,
};
use crate::error::{Result, StoreError};
use crate::format::FieldFormatter;
use crate::ingest::{PreparedWrite, WriteOutcome};

use super::session::MysqlSession;

/// Reads and writes catalogs as MySQL tables.
#[derive(Debug, Clone, Default)]
pub struct CatalogSqlFormatter {
    ingest: IngestConfig,
}

impl CatalogSqlFormatter {
    pub fn new(ingest: IngestConfig) -> Self {
        Self { ingest }
    }

    pub fn ingest_config(&self) -> &IngestConfig {
        &self.ingest
    }

    /// Write a catalog to `table`, optionally creating an alias view.
    pub async fn write_catalog(
        &self,
        conn: &ConnectionConfig,
        catalog: &Catalog,
        table: &str,
        view: Option<&str>,
    ) -> Result<WriteOutcome> {
        let prepared = PreparedWrite::new(catalog, table, view, &self.ingest)?;
        let mut session = MysqlSession::connect(conn).await?;
        let result = prepared.run(&mut session, catalog, &self.ingest).await;
        session.release().await;

        if let Ok(WriteOutcome::Stranded { staging, .. }) = &result {
            warn!("Catalog for {} left in staging table {}", table, staging);
        }
        result
    }

    /// Read every row of `table` as a catalog.
    pub async fn read_catalog(&self, conn: &ConnectionConfig, table: &str) -> Result<Catalog> {
        let sql = format!("SELECT * FROM {}", quote_mysql(table)?);
        let mut session = MysqlSession::connect(conn).await?;
        let result = session.query(&sql).await;
        session.release().await;

        let catalog = catalog_from_result_set(&result?)?;
        info!("Read {} rows from {}", catalog.len(), table);
        Ok(catalog)
    }
}

#[async_trait]
impl ObjectFormatter for CatalogSqlFormatter {
    async fn read(&self, conn: &ConnectionConfig, location: &Location) -> Result<StoredObject> {
        let catalog = self.read_catalog(conn, location.table()?).await?;
        Ok(StoredObject::Catalog(catalog))
    }

    async fn write(
        &self,
        conn: &ConnectionConfig,
        location: &Location,
        obj: &StoredObject,
    ) -> Result<()> {
        let StoredObject::Catalog(catalog) = obj else {
            return Err(StoreError::Unsupported(format!(
                "catalog formatter cannot write a {}",
                obj.kind()
            )));
        };
        self.write_catalog(conn, catalog, location.table()?, location.view.as_deref())
            .await?;
        Ok(())
    }
}

/// Field type of a result column.
fn field_for_column(column: &crate::core::ResultColumn) -> Result<Field> {
    let (field_type, size) = match column.sql_type {
        SqlType::SmallIntUnsigned => (FieldType::U16, 0),
        SqlType::Int => (FieldType::I32, 0),
        SqlType::BigInt => (FieldType::I64, 0),
        SqlType::Float => (FieldType::F32, 0),
        SqlType::Double | SqlType::Decimal => (FieldType::F64, 0),
        SqlType::Bit => (FieldType::Flag, 0),
        SqlType::Char => (FieldType::String, column.length as usize),
        SqlType::Binary | SqlType::Other => {
            return Err(StoreError::Unsupported(format!(
                "column {} of type {:?} cannot be read into a catalog",
                column.name, column.sql_type
            )))
        }
    };
    Ok(Field::sized(column.name.clone(), field_type, size))
}

/// Rebuild a catalog from query results.
pub fn catalog_from_result_set(rs: &ResultSet) -> Result<Catalog> {
    let mut schema = Schema::new();
    let mut formatters = Vec::with_capacity(rs.columns.len());
    for column in &rs.columns {
        let field = field_for_column(column)?;
        let formatter = FieldFormatter::for_type(&field.field_type).ok_or_else(|| {
            StoreError::Unsupported(format!("no formatter for column {}", column.name))
        })?;
        formatters.push(formatter);
        schema.add_field(field)?;
    }

    let mut catalog = Catalog::new(schema);
    for row in &rs.rows {
        let record = formatters
            .iter()
            .zip(row)
            .map(|(formatter, value)| {
                value
                    .as_deref()
                    .map(|bytes| formatter.parse_text(bytes))
                    .transpose()
            })
            .collect::<Result<Record>>()?;
        catalog.push(record)?;
    }
    Ok(catalog)
}
