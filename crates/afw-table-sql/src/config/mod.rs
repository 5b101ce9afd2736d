//! Configuration loading, validation, and credential lookup.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StoreError};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl ConnectionConfig {
    /// Build a connection from a `mysql://host:port/database` URI.
    ///
    /// The port must be given explicitly.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let rest = uri.strip_prefix("mysql://").ok_or_else(|| {
            StoreError::Config(format!("URI must start with mysql://, got {:?}", uri))
        })?;
        let (authority, database) = rest
            .split_once('/')
            .ok_or_else(|| StoreError::Config(format!("URI has no database: {:?}", uri)))?;
        let (host, port) = authority.rsplit_once(':').ok_or_else(|| {
            StoreError::Config(format!("URI must specify a port: {:?}", uri))
        })?;
        let port: u16 = port
            .parse()
            .map_err(|_| StoreError::Config(format!("Invalid port in URI: {:?}", uri)))?;
        let database = database.trim_end_matches('/');
        if host.is_empty() || database.is_empty() {
            return Err(StoreError::Config(format!(
                "URI must name a host and a database: {:?}",
                uri
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
            user: None,
            password: None,
            defaults_file: "~/.my.cnf".to_string(),
        })
    }

    /// The `mysql://host:port/database` form of this connection.
    pub fn uri(&self) -> String {
        format!("mysql://{}:{}/{}", self.host, self.port, self.database)
    }

    /// User and password, falling back to the defaults file's `[client]` section.
    pub fn credentials(&self) -> Result<(Option<String>, Option<String>)> {
        if self.user.is_some() && self.password.is_some() {
            return Ok((self.user.clone(), self.password.clone()));
        }
        let path = expand_home(&self.defaults_file);
        let client = match std::fs::read_to_string(&path) {
            Ok(content) => parse_option_file(&content, "client"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No option file at {}", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        let lookup = |key: &str| {
            client
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        Ok((
            self.user.clone().or_else(|| lookup("user")),
            self.password.clone().or_else(|| lookup("password")),
        ))
    }
}

/// Expand a leading `~` to the `HOME` directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Key/value pairs of one section of a MySQL option file.
fn parse_option_file(content: &str, section: &str) -> Vec<(String, String)> {
    let mut current = String::new();
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.trim().to_string();
            continue;
        }
        if current != section {
            continue;
        }
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        pairs.push((key.trim().replace('-', "_"), value.to_string()));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_yaml_defaults() {
        let config = Config::from_yaml(
            r#"
connection:
  host: db.example.org
  database: repo
"#,
        )
        .unwrap();
        assert_eq!(config.connection.port, 3306);
        assert_eq!(config.connection.defaults_file, "~/.my.cnf");
        assert_eq!(config.ingest.max_column_len, 64);
        assert_eq!(config.ingest.write_mode, WriteMode::Replace);
        assert!(!config.ingest.allow_replace);
    }

    #[test]
    fn test_from_yaml_ingest_section() {
        let config = Config::from_yaml(
            r#"
connection:
  host: localhost
  port: 13306
  database: repo
ingest:
  allow_replace: true
  max_query_len: 4096
  id_field_name: id
  remap:
    "a.b": ab
  extra_columns: "htmId20 BIGINT NOT NULL"
  write_mode: append
"#,
        )
        .unwrap();
        assert_eq!(config.connection.port, 13306);
        assert!(config.ingest.allow_replace);
        assert_eq!(config.ingest.max_query_len, Some(4096));
        assert_eq!(config.ingest.remap.get("a.b").map(String::as_str), Some("ab"));
        assert_eq!(config.ingest.write_mode, WriteMode::Append);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "connection:\n  host: h\n  database: d").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection.host, "h");
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(Config::from_yaml("connection: [").is_err());
        assert!(Config::from_yaml("connection:\n  host: ''\n  database: d").is_err());
    }

    #[test]
    fn test_password_redacted_and_not_serialized() {
        let mut conn = ConnectionConfig::from_uri("mysql://h:3306/d").unwrap();
        conn.password = Some("hunter2".into());
        let debug = format!("{:?}", conn);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
        let yaml = serde_yaml::to_string(&conn).unwrap();
        assert!(!yaml.contains("hunter2"));
    }

    #[test]
    fn test_from_uri() {
        let conn = ConnectionConfig::from_uri("mysql://lsst-db.example.org:3306/repo").unwrap();
        assert_eq!(conn.host, "lsst-db.example.org");
        assert_eq!(conn.port, 3306);
        assert_eq!(conn.database, "repo");
        assert_eq!(conn.uri(), "mysql://lsst-db.example.org:3306/repo");
    }

    #[test]
    fn test_from_uri_requires_port_and_database() {
        assert!(ConnectionConfig::from_uri("mysql://host/repo").is_err());
        assert!(ConnectionConfig::from_uri("mysql://host:3306/").is_err());
        assert!(ConnectionConfig::from_uri("mysql://host:abc/repo").is_err());
        assert!(ConnectionConfig::from_uri("sqlite:///tmp/x").is_err());
    }

    #[test]
    fn test_credentials_from_option_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[mysql]\nuser = wrong\n\n[client]\n# comment\nuser = butler\npassword = \"s3cret\"\n"
        )
        .unwrap();
        let mut conn = ConnectionConfig::from_uri("mysql://h:3306/d").unwrap();
        conn.defaults_file = file.path().to_string_lossy().into_owned();
        let (user, password) = conn.credentials().unwrap();
        assert_eq!(user.as_deref(), Some("butler"));
        assert_eq!(password.as_deref(), Some("s3cret"));

        conn.user = Some("explicit".into());
        let (user, _) = conn.credentials().unwrap();
        assert_eq!(user.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_credentials_without_option_file() {
        let mut conn = ConnectionConfig::from_uri("mysql://h:3306/d").unwrap();
        conn.defaults_file = "/nonexistent/afw-table-sql/.my.cnf".into();
        assert_eq!(conn.credentials().unwrap(), (None, None));
    }
}
