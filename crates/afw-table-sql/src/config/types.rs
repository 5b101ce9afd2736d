//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection.
    pub connection: ConnectionConfig,

    /// Catalog ingestion behavior.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// MySQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username. Read from the defaults file when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password. Read from the defaults file when not set; never serialized.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Option file holding a `[client]` section (default: `~/.my.cnf`).
    #[serde(default = "default_defaults_file")]
    pub defaults_file: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("defaults_file", &self.defaults_file)
            .finish()
    }
}

/// Catalog ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Use REPLACE instead of INSERT (default: false).
    #[serde(default)]
    pub allow_replace: bool,

    /// Maximum statement length in bytes. Queried from the server's
    /// `max_allowed_packet` if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_query_len: Option<usize>,

    /// Fields and aliases whose column name is longer than this are skipped
    /// (default: 64).
    #[serde(default = "default_max_column_len")]
    pub max_column_len: usize,

    /// Field to give a UNIQUE key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field_name: Option<String>,

    /// Explicit field name -> column name overrides.
    #[serde(default)]
    pub remap: BTreeMap<String, String>,

    /// Raw column definitions appended to CREATE TABLE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_columns: Option<String>,

    /// Behavior when the destination table exists (default: replace).
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allow_replace: false,
            max_query_len: None,
            max_column_len: default_max_column_len(),
            id_field_name: None,
            remap: BTreeMap::new(),
            extra_columns: None,
            write_mode: WriteMode::default(),
        }
    }
}

/// How a catalog write treats an existing destination table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Create a staging table and rename it over the destination.
    #[default]
    Replace,

    /// Insert into the destination if it exists, otherwise as `Replace`.
    Append,
}

/// MySQL's identifier length limit.
pub const MYSQL_MAX_IDENTIFIER_LEN: usize = 64;

fn default_mysql_port() -> u16 {
    3306
}

fn default_defaults_file() -> String {
    "~/.my.cnf".to_string()
}

fn default_max_column_len() -> usize {
    MYSQL_MAX_IDENTIFIER_LEN
}
