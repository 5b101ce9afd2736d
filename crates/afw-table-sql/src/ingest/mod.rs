//! Catalog ingestion: schema translation, batching, and publication.
//!
//! [`ingest_catalog`] sequences one write over a single [`SqlSession`]:
//! every statement is built and checked first, then DDL, batched DML, and
//! the final rename run in that order. An alias view, if requested, is
//! created only once the table is in place under its public name.

pub mod batch;
pub mod publish;
pub mod translate;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::BatchPlan;
pub use publish::{
    rename_table_sql, PublishOutcome, PublishState, Publication, MAX_RENAME_ATTEMPTS,
};
pub use translate::{column_name, ColumnSpec, TableLayout};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{IngestConfig, WriteMode};
use crate::core::identifier::{assert_statement_is_safe, escape_string_literal};
use crate::core::{Catalog, SqlSession};
use crate::error::{Result, StoreError};

/// What a catalog write did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new table was published under the destination name.
    Published {
        table: String,
        rows: usize,
        statements: usize,
        attempts: usize,
        view: Option<String>,
    },

    /// Rows were added to the existing destination table.
    Appended {
        table: String,
        rows: usize,
        statements: usize,
        view: Option<String>,
    },

    /// The data was written but remains under the staging name.
    Stranded {
        table: String,
        staging: String,
        rows: usize,
    },
}

/// A fresh, random staging table name.
pub fn staging_table_name() -> String {
    format!("tmp_{}", Uuid::new_v4().simple())
}

/// Statement length limit of the server (`max_allowed_packet`).
pub async fn server_max_query_len<S>(session: &mut S) -> Result<usize>
where
    S: SqlSession + ?Sized,
{
    let rs = session.query("SELECT @@max_allowed_packet").await?;
    let value = rs
        .scalar()
        .ok_or_else(|| StoreError::Config("Server did not report max_allowed_packet".into()))?;
    value.trim().parse().map_err(|_| {
        StoreError::Config(format!("Invalid max_allowed_packet value: {:?}", value))
    })
}

/// Whether `table` exists in the session's current database.
pub async fn table_exists<S>(session: &mut S, table: &str) -> Result<bool>
where
    S: SqlSession + ?Sized,
{
    let sql = format!(
        "SELECT COUNT(*) FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_name = '{}'",
        escape_string_literal(table)
    );
    let rs = session.query(&sql).await?;
    Ok(rs
        .scalar()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0)
        > 0)
}

/// Statements of one catalog write that need no server to build.
///
/// Building one runs every static check (unsupported or colliding fields,
/// field sizes, unsafe names), so callers can fail before connecting.
#[derive(Debug, Clone)]
pub struct PreparedWrite {
    layout: TableLayout,
    table: String,
    staging: String,
    create_sql: String,
    view: Option<(String, String)>,
}

impl PreparedWrite {
    pub fn new(
        catalog: &Catalog,
        table: &str,
        view: Option<&str>,
        ingest: &IngestConfig,
    ) -> Result<Self> {
        let layout = TableLayout::build(catalog.schema(), ingest)?;
        let staging = staging_table_name();
        let create_sql = layout.create_table_sql(&staging)?;
        assert_statement_is_safe(&create_sql)?;
        assert_statement_is_safe(&rename_table_sql(&staging, table)?)?;
        let view = match view {
            Some(v) => {
                let sql = layout.view_sql(v, table, catalog.schema(), ingest)?;
                assert_statement_is_safe(&sql)?;
                Some((v.to_string(), sql))
            }
            None => None,
        };
        Ok(Self {
            layout,
            table: table.to_string(),
            staging,
            create_sql,
            view,
        })
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn staging(&self) -> &str {
        &self.staging
    }

    /// `CREATE TABLE` for the staging table.
    pub fn create_sql(&self) -> &str {
        &self.create_sql
    }

    pub fn view_sql(&self) -> Option<&str> {
        self.view.as_ref().map(|(_, sql)| sql.as_str())
    }

    /// Batches that populate the staging table.
    pub fn staging_plan(&self, catalog: &Catalog, max_query_len: usize) -> Result<BatchPlan> {
        BatchPlan::for_catalog(&self.layout, catalog, &self.staging, max_query_len)
    }

    fn view_name(&self) -> Option<String> {
        self.view.as_ref().map(|(name, _)| name.clone())
    }

    /// Run the write over `session`.
    pub async fn run<S>(
        &self,
        session: &mut S,
        catalog: &Catalog,
        ingest: &IngestConfig,
    ) -> Result<WriteOutcome>
    where
        S: SqlSession + ?Sized,
    {
        let max_query_len = match ingest.max_query_len {
            Some(len) => len,
            None => server_max_query_len(session).await?,
        };
        debug!("max_query_len: {}", max_query_len);

        let table = self.table.as_str();
        if ingest.write_mode == WriteMode::Append && table_exists(session, table).await? {
            let plan = BatchPlan::for_catalog(&self.layout, catalog, table, max_query_len)?;
            plan.execute(session).await?;
            if let Some(sql) = self.view_sql() {
                session.execute(sql).await?;
            }
            info!("Appended {} rows to {}", plan.rows(), table);
            return Ok(WriteOutcome::Appended {
                table: table.to_string(),
                rows: plan.rows(),
                statements: plan.len(),
                view: self.view_name(),
            });
        }

        let plan = self.staging_plan(catalog, max_query_len)?;
        let rows = plan.rows();
        let statements = plan.len();
        let publication =
            Publication::new(self.staging.clone(), table, self.create_sql.clone(), plan)?;

        match publication.run(session).await? {
            PublishOutcome::Published { attempts } => {
                if let Some(sql) = self.view_sql() {
                    session.execute(sql).await?;
                }
                Ok(WriteOutcome::Published {
                    table: table.to_string(),
                    rows,
                    statements,
                    attempts,
                    view: self.view_name(),
                })
            }
            PublishOutcome::Stranded { staging, .. } => {
                if self.view.is_some() {
                    warn!("Not creating view for {}: table was not published", table);
                }
                Ok(WriteOutcome::Stranded {
                    table: table.to_string(),
                    staging,
                    rows,
                })
            }
        }
    }
}

/// Write `catalog` to `table`, optionally creating an alias view.
pub async fn ingest_catalog<S>(
    session: &mut S,
    catalog: &Catalog,
    table: &str,
    view: Option<&str>,
    ingest: &IngestConfig,
) -> Result<WriteOutcome>
where
    S: SqlSession + ?Sized,
{
    PreparedWrite::new(catalog, table, view, ingest)?
        .run(session, catalog, ingest)
        .await
}
