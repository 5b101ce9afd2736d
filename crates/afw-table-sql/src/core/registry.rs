//! Formatter registry for explicit dependency injection.
//!
//! A [`FormatterRegistry`] is constructed once by a storage and consulted for
//! every read and write. Registering a second formatter for the same object
//! kind is an error rather than a silent overwrite.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, StoreError};

use super::traits::ObjectKind;

/// Registry of formatters keyed by object kind.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry: FormatterRegistry<dyn ObjectFormatter> = FormatterRegistry::new();
/// registry.register(ObjectKind::Catalog, Arc::new(CatalogSqlFormatter::new(ingest)))?;
/// let formatter = registry.lookup(ObjectKind::Catalog);
/// ```
pub struct FormatterRegistry<F: ?Sized> {
    formatters: BTreeMap<ObjectKind, Arc<F>>,
}

impl<F: ?Sized> Default for FormatterRegistry<F> {
    fn default() -> Self {
        Self {
            formatters: BTreeMap::new(),
        }
    }
}

impl<F: ?Sized> FormatterRegistry<F> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a formatter for an object kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateFormatter`] if the kind already has one.
    pub fn register(&mut self, kind: ObjectKind, formatter: Arc<F>) -> Result<()> {
        if self.formatters.contains_key(&kind) {
            return Err(StoreError::DuplicateFormatter(kind));
        }
        self.formatters.insert(kind, formatter);
        Ok(())
    }

    /// Get the formatter for an object kind.
    pub fn lookup(&self, kind: ObjectKind) -> Option<Arc<F>> {
        self.formatters.get(&kind).cloned()
    }

    /// Registered kinds, in order.
    pub fn kinds(&self) -> Vec<ObjectKind> {
        self.formatters.keys().copied().collect()
    }
}
