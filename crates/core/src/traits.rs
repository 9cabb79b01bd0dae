//! Core traits for Ermeta
//!
//! This module defines the fundamental traits that metadata types implement
//! to provide consistent behavior for validation, naming, and wire encoding.

use crate::error::MetaResult;
use serde::{Serialize, de::DeserializeOwned};

// ============================================================================
// Validatable Trait
// ============================================================================

/// Trait for types that can be validated
///
/// Types implementing this trait can check their internal consistency
/// and return validation errors if the state is invalid.
///
/// # Example
///
/// ```rust,ignore
/// use ermeta_core::{Validatable, MetaResult, MetaError};
///
/// struct Attr {
///     name: String,
/// }
///
/// impl Validatable for Attr {
///     fn validate(&self) -> MetaResult<()> {
///         if self.name.is_empty() {
///             return Err(MetaError::validation("Name cannot be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validate the current state of the object
    ///
    /// Returns `Ok(())` if valid, or a `MetaError` describing the problem.
    fn validate(&self) -> MetaResult<()>;

    /// Check if the object is valid without returning error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get all validation errors (for types that can have multiple errors)
    fn validation_errors(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(e) => vec![e.to_string()],
        }
    }
}

// ============================================================================
// Named Trait
// ============================================================================

/// Trait for types that have a name
///
/// Types implementing this trait have a human-readable name used for
/// registry keys and diagnostics.
pub trait Named {
    /// Get the name
    fn name(&self) -> &str;

    /// Set the name
    fn set_name(&mut self, name: String);

    /// Check if the name matches (case-insensitive)
    fn name_matches(&self, other: &str) -> bool {
        self.name().eq_ignore_ascii_case(other)
    }
}

// ============================================================================
// Persistable Trait
// ============================================================================

/// Trait for types that can be encoded to and decoded from the wire form
///
/// The definition store exchanges documents as JSON; types implementing
/// this trait round-trip through that encoding.
pub trait Persistable: Serialize + DeserializeOwned + Sized {
    /// Encode to a JSON string
    fn to_json(&self) -> MetaResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Decode from a JSON string
    fn from_json(json: &str) -> MetaResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Encode to a JSON value
    fn to_value(&self) -> MetaResult<serde_json::Value> {
        serde_json::to_value(self).map_err(Into::into)
    }

    /// Decode from a JSON value
    fn from_value(value: serde_json::Value) -> MetaResult<Self> {
        serde_json::from_value(value).map_err(Into::into)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetaError;
    use serde::Deserialize;

    struct TestValidatable {
        valid: bool,
    }

    impl Validatable for TestValidatable {
        fn validate(&self) -> MetaResult<()> {
            if self.valid {
                Ok(())
            } else {
                Err(MetaError::validation("Invalid state"))
            }
        }
    }

    #[test]
    fn test_validatable_trait() {
        let valid = TestValidatable { valid: true };
        assert!(valid.is_valid());
        assert!(valid.validation_errors().is_empty());

        let invalid = TestValidatable { valid: false };
        assert!(!invalid.is_valid());
        assert!(!invalid.validation_errors().is_empty());
    }

    struct TestNamed {
        name: String,
    }

    impl Named for TestNamed {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_name(&mut self, name: String) {
            self.name = name;
        }
    }

    #[test]
    fn test_named_trait() {
        let mut named = TestNamed {
            name: "User".to_string(),
        };
        assert!(named.name_matches("user"));
        assert!(!named.name_matches("role"));

        named.set_name("Role".to_string());
        assert_eq!(named.name(), "Role");
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestDoc {
        name: String,
        count: u32,
    }

    impl Persistable for TestDoc {}

    #[test]
    fn test_persistable_round_trip() {
        let doc = TestDoc {
            name: "Test".to_string(),
            count: 3,
        };

        let json = doc.to_json().unwrap();
        let back = TestDoc::from_json(&json).unwrap();
        assert_eq!(doc, back);

        let value = doc.to_value().unwrap();
        let back = TestDoc::from_value(value).unwrap();
        assert_eq!(doc, back);
    }
}
