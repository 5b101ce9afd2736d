//! Core abstractions for catalog persistence.
//!
//! - [`schema`]: fields, type tags, and the alias map
//! - [`value`]: typed field values and records
//! - [`catalog`]: in-memory catalogs and their JSON document form
//! - [`identifier`]: canonicalization, quoting, and the statement guard
//! - [`alias`]: reverse alias resolution
//! - [`registry`]: formatter registry keyed by object kind
//! - [`traits`]: sessions, formatters, and storage interfaces

pub mod alias;
pub mod catalog;
pub mod identifier;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use alias::aliases_for;
pub use catalog::{Catalog, CatalogDocument};
pub use registry::FormatterRegistry;
pub use repository::RepositoryCfg;
pub use schema::{ArrayElement, Field, FieldType, Schema};
pub use traits::{
    Location, ObjectFormatter, ObjectKind, ResultColumn, ResultSet, SqlSession, SqlType,
    StorageInterface, StoredObject,
};
pub use value::{FieldValue, Record};
