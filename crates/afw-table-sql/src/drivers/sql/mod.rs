//! Generic SQL engine storage over `sqlx`'s Any driver (SQLite, MySQL).

mod catalog;
mod storage;

pub use catalog::{catalog_from_rows, column_type, create_table_sql, insert_sql};
pub use storage::{Backend, SqlStorage};
