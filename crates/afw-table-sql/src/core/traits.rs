//! Core traits for catalog persistence.
//!
//! - [`SqlSession`]: a single connection executing text statements
//! - [`ObjectFormatter`]: reads and writes one kind of object in a database
//! - [`StorageInterface`]: the storage contract a repository exposes
//!
//! The ingestion engine only talks to [`SqlSession`], so it can be exercised
//! without a server.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::error::Result;

use super::catalog::Catalog;
use super::repository::RepositoryCfg;

/// Kinds of objects a storage can hold, used for formatter dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Catalog,
    RepositoryCfg,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Catalog => f.write_str("catalog"),
            ObjectKind::RepositoryCfg => f.write_str("repository configuration"),
        }
    }
}

/// An object read from or written to storage.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredObject {
    Catalog(Catalog),
    RepositoryCfg(RepositoryCfg),
}

impl StoredObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            StoredObject::Catalog(_) => ObjectKind::Catalog,
            StoredObject::RepositoryCfg(_) => ObjectKind::RepositoryCfg,
        }
    }

    pub fn into_catalog(self) -> Option<Catalog> {
        match self {
            StoredObject::Catalog(c) => Some(c),
            _ => None,
        }
    }
}

/// Where an object lives: its kind plus one or more table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub kind: ObjectKind,
    pub locations: Vec<String>,
    /// Optional alias view to create alongside a written catalog.
    pub view: Option<String>,
}

impl Location {
    pub fn new(kind: ObjectKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            locations: vec![table.into()],
            view: None,
        }
    }

    pub fn catalog(table: impl Into<String>) -> Self {
        Self::new(ObjectKind::Catalog, table)
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// The first location, which names the table.
    pub fn table(&self) -> Result<&str> {
        self.locations
            .first()
            .map(String::as_str)
            .ok_or_else(|| crate::error::StoreError::Config("Location has no table name".into()))
    }
}

/// Column type reported by a result set, reduced to what retrieval needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    SmallIntUnsigned,
    /// Any integer type of at most 32 bits other than `SMALLINT UNSIGNED`.
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Bit,
    /// Character data (non-binary collation).
    Char,
    /// Binary strings and blobs.
    Binary,
    /// Date/time and anything else.
    Other,
}

/// Metadata of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub sql_type: SqlType,
    /// Declared column length in characters.
    pub length: u32,
}

/// Rows in text form: each value is its textual bytes, `None` for NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<Option<Vec<u8>>>>,
}

impl ResultSet {
    /// First value of the first row as text.
    pub fn scalar(&self) -> Option<String> {
        self.rows
            .first()
            .and_then(|r| r.first())
            .and_then(|v| v.as_ref())
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// One database connection executing text statements sequentially.
#[async_trait]
pub trait SqlSession: Send {
    /// Execute a statement with no result.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Execute a query and collect its rows.
    async fn query(&mut self, sql: &str) -> Result<ResultSet>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;
}

/// Reads and writes one kind of object.
#[async_trait]
pub trait ObjectFormatter: Send + Sync {
    async fn read(&self, conn: &ConnectionConfig, location: &Location) -> Result<StoredObject>;

    async fn write(
        &self,
        conn: &ConnectionConfig,
        location: &Location,
        obj: &StoredObject,
    ) -> Result<()>;
}

/// Storage contract exposed to a persistence framework.
#[async_trait]
pub trait StorageInterface: Send + Sync {
    async fn read(&self, location: &Location) -> Result<StoredObject>;

    async fn write(&self, location: &Location, obj: &StoredObject) -> Result<()>;

    async fn exists(&self, location: &Location) -> Result<bool>;

    /// Table names matching a `LIKE` pattern.
    async fn instance_search(&self, path: &str) -> Result<Vec<String>>;

    async fn copy_file(&self, from: &str, to: &str) -> Result<()>;

    /// Local file path of a stored object; not meaningful for databases.
    async fn get_local_file(&self, path: &str) -> Result<std::path::PathBuf>;

    /// Location URI joined with the storage root.
    fn location_with_root(&self, location: &str) -> Result<String>;
}
