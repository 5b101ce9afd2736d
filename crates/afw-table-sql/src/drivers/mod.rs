//! Storage backends.
//!
//! - [`mysql`]: MySQL storage with create -> populate -> rename publication
//! - [`sql`]: append-only catalog storage on any `sqlx` engine
//!
//! Both implement [`StorageInterface`](crate::core::StorageInterface).

pub mod mysql;
pub mod sql;

pub use mysql::{CatalogSqlFormatter, MySqlStorage, MysqlSession, RepositoryCfgFormatter};
pub use sql::{Backend, SqlStorage};
