//! Centralized identifier canonicalization, quoting, and statement guarding.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! identifier that ends up in generated SQL is routed through this module.
//! Value literals are escaped by the formatters in [`crate::format`].
//!
//! # Security
//!
//! Statements that embed caller-supplied text which is not escaped (table
//! names in `RENAME TABLE`, `extra_columns` DDL fragments, database names)
//! must pass [`assert_statement_is_safe`] before they are executed.

use crate::error::{Result, StoreError};

/// Maximum identifier length accepted before quoting.
///
/// MySQL limits table and column names to 64 characters; the column length
/// limit used during ingestion is configured separately.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Replace every character outside `[A-Za-z0-9_]` with an underscore.
///
/// The result is always a legal unquoted column name for MySQL, and the
/// transformation is idempotent.
pub fn canonicalize_field_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers longer than [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(StoreError::Security(format!(
            "Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(StoreError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// Escapes backticks by doubling them and wraps in backticks.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote an ANSI SQL identifier (SQLite, PostgreSQL) with double quotes.
pub fn quote_ansi(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Escape text for use inside a single-quoted string literal.
///
/// Backslashes are escaped first so the escape characters added for quotes
/// are not escaped again.
pub fn escape_string_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Reject statement text that contains a statement separator.
///
/// Applied to every statement that embeds unescaped caller-supplied text.
pub fn assert_statement_is_safe(sql: &str) -> Result<()> {
    if sql.contains(';') {
        return Err(StoreError::Security(format!(
            "Statement contains a statement separator (possible injection): {:?}",
            sql
        )));
    }
    Ok(())
}
