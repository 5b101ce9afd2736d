//! Configuration validation.

use super::{Config, MYSQL_MAX_IDENTIFIER_LEN};
use crate::error::{Result, StoreError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Connection validation
    if config.connection.host.is_empty() {
        return Err(StoreError::Config("connection.host is required".into()));
    }
    if config.connection.database.is_empty() {
        return Err(StoreError::Config("connection.database is required".into()));
    }

    // Ingest validation
    let ingest = &config.ingest;
    if ingest.max_column_len == 0 {
        return Err(StoreError::Config(
            "ingest.max_column_len must be at least 1".into(),
        ));
    }
    if ingest.max_column_len > MYSQL_MAX_IDENTIFIER_LEN {
        return Err(StoreError::Config(format!(
            "ingest.max_column_len cannot exceed {}, got {}",
            MYSQL_MAX_IDENTIFIER_LEN, ingest.max_column_len
        )));
    }
    if let Some(0) = ingest.max_query_len {
        return Err(StoreError::Config(
            "ingest.max_query_len must be at least 1".into(),
        ));
    }
    if let Some((field, _)) = ingest.remap.iter().find(|(_, column)| column.is_empty()) {
        return Err(StoreError::Config(format!(
            "ingest.remap target for field '{}' cannot be empty",
            field
        )));
    }

    Ok(())
}
