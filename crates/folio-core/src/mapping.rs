//! The domain-to-application error mapping registry.
//!
//! Built once at process start from an explicit, exhaustively-enumerated
//! table; read-only afterwards. Replaces runtime attribute discovery with
//! a static table so that the full set of translations is visible (and
//! testable) in one place.
//!
//! # Example
//!
//! ```
//! use folio_core::{ErrorCategory, ErrorMappings};
//!
//! let mappings = ErrorMappings::builder()
//!     .map("book.not_found", ErrorCategory::NotFound, None)
//!     .map("book.isbn_taken", ErrorCategory::AlreadyExists, Some("isbn"))
//!     .build()
//!     .expect("duplicate-free table");
//!
//! let entry = mappings.lookup("book.isbn_taken").unwrap();
//! assert_eq!(entry.category, ErrorCategory::AlreadyExists);
//! assert_eq!(entry.field, Some("isbn"));
//! ```

use crate::ErrorCategory;
use std::collections::HashMap;
use thiserror::Error;

/// A single translation entry: external category plus the optional field
/// name used for client-side form binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMapping {
    /// The external category the internal code translates to.
    pub category: ErrorCategory,
    /// The form field the error binds to, if any.
    pub field: Option<&'static str>,
}

/// Errors raised while building the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// The same internal code was mapped twice.
    #[error("error code '{0}' is mapped more than once")]
    DuplicateCode(String),
}

/// The read-only translation registry.
///
/// Looked up by internal error code; never mutated per-request.
#[derive(Debug, Clone, Default)]
pub struct ErrorMappings {
    entries: HashMap<&'static str, ErrorMapping>,
}

impl ErrorMappings {
    /// Creates a registry builder.
    #[must_use]
    pub fn builder() -> ErrorMappingsBuilder {
        ErrorMappingsBuilder::default()
    }

    /// Looks up the mapping for an internal error code.
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<&ErrorMapping> {
        self.entries.get(code)
    }

    /// Returns `true` if the code has a mapping.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// Returns the number of mapped codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`ErrorMappings`].
///
/// Entries are collected in declaration order; [`build`](Self::build)
/// rejects duplicate codes so a typo cannot silently shadow an earlier
/// mapping.
#[derive(Debug, Default)]
pub struct ErrorMappingsBuilder {
    entries: Vec<(&'static str, ErrorMapping)>,
}

impl ErrorMappingsBuilder {
    /// Adds a translation entry.
    #[must_use]
    pub fn map(
        mut self,
        code: &'static str,
        category: ErrorCategory,
        field: Option<&'static str>,
    ) -> Self {
        self.entries.push((code, ErrorMapping { category, field }));
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::DuplicateCode`] if any code appears twice.
    pub fn build(self) -> Result<ErrorMappings, MappingError> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        for (code, mapping) in self.entries {
            if entries.insert(code, mapping).is_some() {
                return Err(MappingError::DuplicateCode(code.to_string()));
            }
        }
        Ok(ErrorMappings { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_mapped_code() {
        let mappings = ErrorMappings::builder()
            .map("author.not_found", ErrorCategory::NotFound, None)
            .build()
            .unwrap();

        let entry = mappings.lookup("author.not_found").unwrap();
        assert_eq!(entry.category, ErrorCategory::NotFound);
        assert_eq!(entry.field, None);
    }

    #[test]
    fn test_lookup_unmapped_code() {
        let mappings = ErrorMappings::builder()
            .map("author.not_found", ErrorCategory::NotFound, None)
            .build()
            .unwrap();

        assert!(mappings.lookup("author.name_taken").is_none());
        assert!(!mappings.contains("author.name_taken"));
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let result = ErrorMappings::builder()
            .map("book.not_found", ErrorCategory::NotFound, None)
            .map("book.not_found", ErrorCategory::BusinessRule, None)
            .build();

        assert_eq!(
            result.unwrap_err(),
            MappingError::DuplicateCode("book.not_found".to_string())
        );
    }

    #[test]
    fn test_field_mapping_preserved() {
        let mappings = ErrorMappings::builder()
            .map("book.isbn_taken", ErrorCategory::AlreadyExists, Some("isbn"))
            .build()
            .unwrap();

        assert_eq!(
            mappings.lookup("book.isbn_taken").unwrap().field,
            Some("isbn")
        );
    }

    #[test]
    fn test_len_and_empty() {
        let empty = ErrorMappings::builder().build().unwrap();
        assert!(empty.is_empty());

        let mappings = ErrorMappings::builder()
            .map("a.b", ErrorCategory::BusinessRule, None)
            .map("c.d", ErrorCategory::OperationFailed, None)
            .build()
            .unwrap();
        assert_eq!(mappings.len(), 2);
    }
}
