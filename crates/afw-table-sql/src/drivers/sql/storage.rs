//! Storage on any SQL engine reachable through `sqlx`'s Any driver.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::migrate::MigrateDatabase;
use sqlx::{Any, AnyPool, Row};
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::core::identifier::{quote_ansi, quote_mysql};
use crate::core::{Catalog, Location, ObjectKind, StorageInterface, StoredObject};
use crate::error::{Result, StoreError};
use crate::ingest::TableLayout;

use super::catalog::{bind_value, catalog_from_rows, create_table_sql, insert_sql};

/// SQL dialect family of a connection URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Mysql,
    Other,
}

impl Backend {
    pub fn from_uri(uri: &str) -> Self {
        match uri.split(':').next().unwrap_or("") {
            "sqlite" => Backend::Sqlite,
            "mysql" | "mariadb" => Backend::Mysql,
            _ => Backend::Other,
        }
    }

    /// Quote an identifier for this backend.
    pub fn quote(self, name: &str) -> Result<String> {
        match self {
            Backend::Mysql => quote_mysql(name),
            Backend::Sqlite | Backend::Other => quote_ansi(name),
        }
    }

    fn table_exists_sql(self) -> &'static str {
        match self {
            Backend::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            Backend::Mysql | Backend::Other => {
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
        }
    }
}

/// Catalog storage on a generic SQL engine.
///
/// Catalog writes append rows to the table, creating it first if needed.
/// Repository configuration is not supported.
pub struct SqlStorage {
    uri: String,
    backend: Backend,
    pool: AnyPool,
    ingest: IngestConfig,
}

impl SqlStorage {
    /// Open the database at `uri`, creating it if `create` is set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRepositoryAtRoot`] if the database does not
    /// exist and `create` is false.
    pub async fn open(uri: &str, create: bool, ingest: IngestConfig) -> Result<Self> {
        install_default_drivers();

        if !Any::database_exists(uri).await? {
            if !create {
                return Err(StoreError::NoRepositoryAtRoot(uri.to_string()));
            }
            Any::create_database(uri).await?;
            info!("Created database {}", uri);
        }

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(uri)
            .await
            .map_err(|e| StoreError::connection(e, format!("connecting to {}", uri)))?;

        Ok(Self {
            uri: uri.to_string(),
            backend: Backend::from_uri(uri),
            pool,
            ingest,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Append the catalog's rows to `table` in one transaction.
    pub async fn write_catalog(&self, catalog: &Catalog, table: &str) -> Result<usize> {
        let layout = TableLayout::build(catalog.schema(), &self.ingest)?;
        let quote = |name: &str| self.backend.quote(name);
        let create = create_table_sql(&layout, table, quote)?;
        let insert = insert_sql(&layout, table, quote)?;

        let mut tx = self.pool.begin().await?;
        debug!("{}", create);
        sqlx::query(&create).execute(&mut *tx).await?;
        debug!("{}", insert);
        for record in catalog.records() {
            let mut query = sqlx::query(&insert);
            for column in layout.columns() {
                query = bind_value(query, &column.field, record[column.field_index].as_ref())?;
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Wrote {} rows to {}", catalog.len(), table);
        Ok(catalog.len())
    }

    /// Every row of `table` as a catalog.
    pub async fn read_catalog(&self, table: &str) -> Result<Catalog> {
        let sql = format!("SELECT * FROM {}", self.backend.quote(table)?);
        debug!("{}", sql);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        catalog_from_rows(&rows)
    }

    /// Close the connection pool.
    pub async fn close(self) {
        self.pool.close().await;
    }

    fn unsupported(&self, what: &str) -> StoreError {
        StoreError::Unsupported(format!("{} is not supported by SqlStorage({})", what, self.uri))
    }
}

#[async_trait]
impl StorageInterface for SqlStorage {
    async fn read(&self, location: &Location) -> Result<StoredObject> {
        match location.kind {
            ObjectKind::Catalog => Ok(StoredObject::Catalog(
                self.read_catalog(location.table()?).await?,
            )),
            ObjectKind::RepositoryCfg => Err(self.unsupported("reading repository configuration")),
        }
    }

    async fn write(&self, location: &Location, obj: &StoredObject) -> Result<()> {
        match obj {
            StoredObject::Catalog(catalog) => {
                self.write_catalog(catalog, location.table()?).await?;
                Ok(())
            }
            StoredObject::RepositoryCfg(_) => {
                Err(self.unsupported("writing repository configuration"))
            }
        }
    }

    async fn exists(&self, location: &Location) -> Result<bool> {
        let row = sqlx::query(self.backend.table_exists_sql())
            .bind(location.table()?.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)? > 0)
    }

    async fn instance_search(&self, _path: &str) -> Result<Vec<String>> {
        Err(self.unsupported("search"))
    }

    async fn copy_file(&self, _from: &str, _to: &str) -> Result<()> {
        Err(self.unsupported("copy_file"))
    }

    async fn get_local_file(&self, _path: &str) -> Result<PathBuf> {
        Err(self.unsupported("get_local_file"))
    }

    fn location_with_root(&self, _location: &str) -> Result<String> {
        Err(self.unsupported("location_with_root"))
    }
}
