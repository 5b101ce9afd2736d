//! Error types for catalog persistence.

use thiserror::Error;

use crate::core::ObjectKind;

/// MySQL server error: table already exists.
pub const ER_TABLE_EXISTS_ERROR: u16 = 1050;

/// MySQL server error: table does not exist.
pub const ER_NO_SUCH_TABLE: u16 = 1146;

/// Main error type for catalog persistence operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Configuration error (invalid YAML, missing fields, bad URI, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A schema field cannot be translated into a column.
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// Two or more fields map onto the same column name.
    #[error(
        "Schema contains columns that differ only by non-word characters and/or case:\n{0}\n\
         In the database, these cannot be distinguished and hence result in column name \
         duplicates. Use the remap configuration parameter to resolve this ambiguity."
    )]
    NameCollision(String),

    /// No formatter is registered for the requested object kind.
    #[error("No formatter registered with {storage} for {kind}")]
    NoFormatter { storage: String, kind: ObjectKind },

    /// A formatter was registered twice for the same object kind.
    #[error("Registration of second formatter for {0}")]
    DuplicateFormatter(ObjectKind),

    /// A single row does not fit into one statement.
    #[error("Single row is too large to insert: row {row} needs {row_len} bytes, {budget} available")]
    RowTooLarge {
        row: usize,
        row_len: usize,
        budget: usize,
    },

    /// A value does not match the type of its field.
    #[error("Type mismatch for field {field}: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    /// Operation or column type that is not implemented.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Statement text rejected by the injection guard.
    #[error("SECURITY: {0}")]
    Security(String),

    /// No repository (database) exists at the requested root.
    #[error("No repository at {0}")]
    NoRepositoryAtRoot(String),

    /// Error reported by the MySQL server, with its numeric code.
    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },

    /// Connection error with context
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Generic SQL engine error
    #[error("SQL engine error: {0}")]
    Sql(#[from] sqlx::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        StoreError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an InvalidField error
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Server code carried by this error, if any.
    pub fn server_code(&self) -> Option<u16> {
        match self {
            StoreError::Server { code, .. } => Some(*code),
            StoreError::Mysql(mysql_async::Error::Server(e)) => Some(e.code),
            _ => None,
        }
    }

    /// Whether the server refused because the table name is already taken.
    pub fn is_table_exists(&self) -> bool {
        self.server_code() == Some(ER_TABLE_EXISTS_ERROR)
    }

    /// Whether the server refused because the table does not exist.
    pub fn is_no_such_table(&self) -> bool {
        self.server_code() == Some(ER_NO_SUCH_TABLE)
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            StoreError::Config(_) | StoreError::Yaml(_) | StoreError::Json(_) => 2,
            StoreError::InvalidField { .. }
            | StoreError::NameCollision(_)
            | StoreError::TypeMismatch { .. }
            | StoreError::RowTooLarge { .. } => 3,
            StoreError::NoRepositoryAtRoot(_) => 4,
            StoreError::Connection { .. } | StoreError::Mysql(_) | StoreError::Sql(_) => 5,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for catalog persistence operations.
pub type Result<T> = std::result::Result<T, StoreError>;
