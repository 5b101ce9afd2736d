//! MySQL-backed storage: one database per repository, one table per object.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{ConnectionConfig, IngestConfig};
use crate::core::identifier::{assert_statement_is_safe, quote_mysql, validate_identifier};
use crate::core::{
    FormatterRegistry, Location, ObjectFormatter, ObjectKind, RepositoryCfg, SqlSession,
    StorageInterface, StoredObject,
};
use crate::error::{Result, StoreError};

use super::catalog::CatalogSqlFormatter;
use super::repo_cfg::{RepositoryCfgFormatter, REPOSITORY_CFG_TABLE};
use super::session::MysqlSession;

/// URI scheme handled by [`MySqlStorage`].
pub const SCHEME: &str = "mysql";

impl FormatterRegistry<dyn ObjectFormatter> {
    /// Registry holding the catalog and repository configuration formatters.
    pub fn with_builtins(ingest: IngestConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(
            ObjectKind::Catalog,
            Arc::new(CatalogSqlFormatter::new(ingest)),
        )?;
        registry.register(ObjectKind::RepositoryCfg, Arc::new(RepositoryCfgFormatter))?;
        Ok(registry)
    }
}

/// Storage rooted at `mysql://host:port/database`.
pub struct MySqlStorage {
    uri: String,
    conn: ConnectionConfig,
    formatters: FormatterRegistry<dyn ObjectFormatter>,
}

impl MySqlStorage {
    /// Open the repository at `uri`, creating its database if `create` is set.
    pub async fn open(uri: &str, create: bool, ingest: IngestConfig) -> Result<Self> {
        let conn = ConnectionConfig::from_uri(uri)?;
        Self::open_with(conn, create, ingest).await
    }

    /// Open the repository described by `conn`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRepositoryAtRoot`] if the database does not
    /// exist and `create` is false.
    pub async fn open_with(conn: ConnectionConfig, create: bool, ingest: IngestConfig) -> Result<Self> {
        validate_identifier(&conn.database)?;
        let mut session = MysqlSession::connect_server(&conn).await?;
        let result = ensure_database(&mut session, &conn, create).await;
        session.release().await;
        result?;

        Self::with_connection(conn, ingest)
    }

    /// Storage over `conn` without contacting the server.
    pub fn with_connection(conn: ConnectionConfig, ingest: IngestConfig) -> Result<Self> {
        Ok(Self {
            uri: conn.uri(),
            formatters: FormatterRegistry::with_builtins(ingest)?,
            conn,
        })
    }

    /// Replace the formatter registry.
    pub fn with_formatters(mut self, formatters: FormatterRegistry<dyn ObjectFormatter>) -> Self {
        self.formatters = formatters;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.conn
    }

    fn formatter(&self, kind: ObjectKind) -> Result<Arc<dyn ObjectFormatter>> {
        self.formatters.lookup(kind).ok_or_else(|| StoreError::NoFormatter {
            storage: format!("MySqlStorage({})", self.uri),
            kind,
        })
    }

    /// Tables under `root` whose names match the `LIKE` pattern `path`.
    pub async fn search(root: &str, path: &str) -> Result<Vec<String>> {
        let storage = Self::open(root, false, IngestConfig::default()).await?;
        storage.instance_search(path).await
    }

    /// Repository configuration stored at `uri`, if any.
    pub async fn get_repository_cfg(uri: &str) -> Result<Option<RepositoryCfg>> {
        let storage = match Self::open(uri, false, IngestConfig::default()).await {
            Ok(storage) => storage,
            Err(StoreError::NoRepositoryAtRoot(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        RepositoryCfgFormatter.read_cfg(&storage.conn).await
    }

    /// Store `cfg` in the repository at `loc`, creating it if needed.
    pub async fn put_repository_cfg(cfg: &RepositoryCfg, loc: &str) -> Result<()> {
        let storage = Self::open(loc, true, IngestConfig::default()).await?;
        let location = Location::new(ObjectKind::RepositoryCfg, REPOSITORY_CFG_TABLE);
        storage
            .write(&location, &StoredObject::RepositoryCfg(cfg.clone()))
            .await
    }

    /// Mapper named by the repository configuration at `root`.
    pub async fn get_mapper_class(root: &str) -> Result<Option<String>> {
        Ok(Self::get_repository_cfg(root)
            .await?
            .and_then(|cfg| cfg.mapper))
    }
}

async fn ensure_database(
    session: &mut MysqlSession,
    conn: &ConnectionConfig,
    create: bool,
) -> Result<()> {
    if create {
        let sql = format!("CREATE DATABASE IF NOT EXISTS {}", quote_mysql(&conn.database)?);
        assert_statement_is_safe(&sql)?;
        session.execute(&sql).await?;
        info!("Ensured database {} exists", conn.database);
        return Ok(());
    }

    let count: u64 = session
        .exec_scalar(
            "SELECT COUNT(*) FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
            (conn.database.as_str(),),
        )
        .await?
        .unwrap_or(0);
    if count == 0 {
        return Err(StoreError::NoRepositoryAtRoot(conn.uri()));
    }
    Ok(())
}

#[async_trait]
impl StorageInterface for MySqlStorage {
    async fn read(&self, location: &Location) -> Result<StoredObject> {
        self.formatter(location.kind)?
            .read(&self.conn, location)
            .await
    }

    async fn write(&self, location: &Location, obj: &StoredObject) -> Result<()> {
        self.formatter(obj.kind())?
            .write(&self.conn, location, obj)
            .await
    }

    async fn exists(&self, location: &Location) -> Result<bool> {
        let table = location.table()?;
        let mut session = MysqlSession::connect(&self.conn).await?;
        let result = session
            .exec_scalar::<u64, _>(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = ? AND table_name = ?",
                (self.conn.database.as_str(), table),
            )
            .await;
        session.release().await;
        Ok(result?.unwrap_or(0) > 0)
    }

    async fn instance_search(&self, path: &str) -> Result<Vec<String>> {
        let mut session = MysqlSession::connect(&self.conn).await?;
        let result = session
            .exec_column::<String, _>(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = ? AND table_name LIKE ? ORDER BY table_name",
                (self.conn.database.as_str(), path),
            )
            .await;
        session.release().await;
        let tables = result?;
        debug!("{} tables match {}", tables.len(), path);
        Ok(tables)
    }

    async fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} AS SELECT * FROM {}",
            quote_mysql(to)?,
            quote_mysql(from)?
        );
        assert_statement_is_safe(&sql)?;

        let mut session = MysqlSession::connect(&self.conn).await?;
        let result = async {
            session.execute(&sql).await?;
            session.commit().await
        }
        .await;
        session.release().await;
        result
    }

    async fn get_local_file(&self, path: &str) -> Result<PathBuf> {
        Err(StoreError::Unsupported(format!(
            "MySqlStorage has no local file for {}",
            path
        )))
    }

    fn location_with_root(&self, location: &str) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.uri.trim_end_matches('/'),
            location.trim_start_matches('/')
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> MySqlStorage {
        let conn = ConnectionConfig::from_uri("mysql://db.example:3306/repo").unwrap();
        MySqlStorage::with_connection(conn, IngestConfig::default()).unwrap()
    }

    #[test]
    fn test_builtins_registered() {
        let registry = FormatterRegistry::<dyn ObjectFormatter>::with_builtins(IngestConfig::default())
            .unwrap();
        assert_eq!(
            registry.kinds(),
            vec![ObjectKind::Catalog, ObjectKind::RepositoryCfg]
        );
    }

    #[test]
    fn test_location_with_root() {
        let s = storage();
        assert_eq!(s.uri(), "mysql://db.example:3306/repo");
        assert_eq!(
            s.location_with_root("calexp").unwrap(),
            "mysql://db.example:3306/repo/calexp"
        );
        assert_eq!(
            s.location_with_root("/calexp").unwrap(),
            "mysql://db.example:3306/repo/calexp"
        );
    }

    #[tokio::test]
    async fn test_missing_formatter() {
        let s = storage().with_formatters(FormatterRegistry::new());
        let err = s.read(&Location::catalog("t")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NoFormatter {
                kind: ObjectKind::Catalog,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_local_file_unsupported() {
        let err = storage().get_local_file("t").await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_copy_rejects_unsafe_names() {
        let err = storage().copy_file("a", "b;c").await.unwrap_err();
        assert!(matches!(err, StoreError::Security(_)));
    }

    #[tokio::test]
    async fn test_open_requires_port() {
        let result =
            MySqlStorage::open("mysql://db.example/repo", false, IngestConfig::default()).await;
        assert!(matches!(result, Err(StoreError::Config(_))));
    }
}
