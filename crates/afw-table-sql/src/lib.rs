//! # afw-table-sql
//!
//! Persist columnar catalogs into MySQL and other SQL databases.
//!
//! A catalog is a schema plus rows. Writing one to MySQL:
//!
//! - translates the schema into a table definition, canonicalizing field
//!   names and rejecting names that collide
//! - packs rows into as few `INSERT` statements as the server's statement
//!   size limit allows
//! - loads them into a staging table which is then renamed into place,
//!   retrying if a concurrent writer holds the name
//! - optionally creates a view exposing the schema's aliases
//!
//! ## Example
//!
//! ```rust,no_run
//! use afw_table_sql::{CatalogDocument, Location, MySqlStorage, StorageInterface, StoredObject};
//!
//! #[tokio::main]
//! async fn main() -> afw_table_sql::Result<()> {
//!     let catalog = CatalogDocument::load("src.json")?.into_catalog()?;
//!     let storage = MySqlStorage::open("mysql://localhost:3306/repo", true, Default::default()).await?;
//!     storage
//!         .write(&Location::catalog("src").with_view("src_view"), &StoredObject::Catalog(catalog))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod format;
pub mod ingest;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, IngestConfig, WriteMode};
pub use self::core::{
    aliases_for, Catalog, CatalogDocument, Field, FieldType, FieldValue, FormatterRegistry,
    Location, ObjectFormatter, ObjectKind, Record, RepositoryCfg, Schema, StorageInterface,
    StoredObject,
};
pub use drivers::{CatalogSqlFormatter, MySqlStorage, RepositoryCfgFormatter, SqlStorage};
pub use error::{Result, StoreError};
pub use ingest::{ingest_catalog, BatchPlan, PreparedWrite, TableLayout, WriteOutcome};
