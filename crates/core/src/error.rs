//! Error types for Ermeta
//!
//! This module provides unified error handling across the metadata engine,
//! covering structural conversion errors, schema compilation, document
//! validation, and registry lookups.

use thiserror::Error;

/// The main error type for Ermeta
#[derive(Debug, Error)]
pub enum MetaError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// General validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity validation failed
    #[error("Entity validation failed for '{entity}': {message}")]
    EntityValidation { entity: String, message: String },

    /// Attribute validation failed
    #[error("Attribute validation failed for '{entity}.{attribute}': {message}")]
    AttributeValidation {
        entity: String,
        attribute: String,
        message: String,
    },

    // ========================================================================
    // Conversion Errors
    // ========================================================================
    /// An attribute record has no resolvable name
    #[error("Attribute name is required in entity '{entity}'")]
    MissingAttributeName { entity: String },

    /// A stored type tag does not match any known simple attribute type
    #[error("Unknown attribute type '{type_tag}' for '{entity}.{attribute}'")]
    UnknownAttrType {
        entity: String,
        attribute: String,
        type_tag: String,
    },

    /// Array-typed attribute declared with an invalid element shape
    #[error("Invalid array element for '{entity}.{attribute}': {message}")]
    InvalidArrayElement {
        entity: String,
        attribute: String,
        message: String,
    },

    // ========================================================================
    // Schema Errors
    // ========================================================================
    /// Schema compilation failed
    #[error("Schema compilation failed for '{entity}.{attribute}': {message}")]
    SchemaCompilation {
        entity: String,
        attribute: String,
        message: String,
    },

    /// A `match` pattern failed to compile
    #[error("Invalid match pattern for '{entity}.{attribute}': {message}")]
    InvalidPattern {
        entity: String,
        attribute: String,
        message: String,
    },

    /// A document failed validation against a compiled schema
    #[error("Document validation failed for '{schema}.{path}': {message}")]
    DocumentValidation {
        schema: String,
        path: String,
        message: String,
    },

    // ========================================================================
    // Not Found Errors
    // ========================================================================
    /// Entity not found in the registry
    #[error("Entity {0} not found")]
    EntityNotFound(String),

    /// Model not found in the registry
    #[error("Model {0} not found")]
    ModelNotFound(String),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MetaError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        MetaError::Validation(msg.into())
    }

    /// Create an entity validation error
    pub fn entity_validation(entity: impl Into<String>, msg: impl Into<String>) -> Self {
        MetaError::EntityValidation {
            entity: entity.into(),
            message: msg.into(),
        }
    }

    /// Create an attribute validation error
    pub fn attribute_validation(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        MetaError::AttributeValidation {
            entity: entity.into(),
            attribute: attribute.into(),
            message: msg.into(),
        }
    }

    /// Create an unknown-type error
    pub fn unknown_attr_type(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Self {
        MetaError::UnknownAttrType {
            entity: entity.into(),
            attribute: attribute.into(),
            type_tag: type_tag.into(),
        }
    }

    /// Create a schema compilation error
    pub fn schema_compilation(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        MetaError::SchemaCompilation {
            entity: entity.into(),
            attribute: attribute.into(),
            message: msg.into(),
        }
    }

    /// Create a document validation error
    pub fn document_validation(
        schema: impl Into<String>,
        path: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        MetaError::DocumentValidation {
            schema: schema.into(),
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        MetaError::Internal(msg.into())
    }

    /// Check if this error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MetaError::Validation(_)
                | MetaError::EntityValidation { .. }
                | MetaError::AttributeValidation { .. }
                | MetaError::DocumentValidation { .. }
        )
    }

    /// Check if this error is a structural conversion error
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MetaError::MissingAttributeName { .. }
                | MetaError::UnknownAttrType { .. }
                | MetaError::InvalidArrayElement { .. }
        )
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MetaError::EntityNotFound(_) | MetaError::ModelNotFound(_)
        )
    }
}

/// Result type alias using MetaError
pub type MetaResult<T> = Result<T, MetaError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Wrap the error message with additional context
    fn with_context<C: Into<String>>(self, context: C) -> MetaResult<T>;
}

impl<T, E: Into<MetaError>> ResultExt<T> for Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> MetaResult<T> {
        self.map_err(|e| {
            let err: MetaError = e.into();
            MetaError::Validation(format!("{}: {}", context.into(), err))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = MetaError::validation("Name is required");
        assert!(err.is_validation());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Validation error: Name is required");
    }

    #[test]
    fn test_entity_validation_error() {
        let err = MetaError::entity_validation("User", "name must be unique");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Entity validation failed for 'User': name must be unique"
        );
    }

    #[test]
    fn test_attribute_validation_error() {
        let err = MetaError::attribute_validation("User", "email", "empty enum array");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Attribute validation failed for 'User.email': empty enum array"
        );
    }

    #[test]
    fn test_unknown_attr_type() {
        let err = MetaError::unknown_attr_type("User", "age", "integer");
        assert!(err.is_structural());
        assert!(!err.is_validation());
        assert_eq!(
            err.to_string(),
            "Unknown attribute type 'integer' for 'User.age'"
        );
    }

    #[test]
    fn test_not_found_errors() {
        let err = MetaError::EntityNotFound("User".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Entity User not found");

        let err = MetaError::ModelNotFound("User".to_string());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_schema_compilation_error() {
        let err = MetaError::schema_compilation("Chat", "data", "unknown element type");
        assert_eq!(
            err.to_string(),
            "Schema compilation failed for 'Chat.data': unknown element type"
        );
    }

    #[test]
    fn test_result_ext_context() {
        let res: Result<(), serde_json::Error> =
            serde_json::from_str::<()>("not json").map(|_| ());
        let err = res.with_context("loading definition").unwrap_err();
        assert!(err.to_string().starts_with("Validation error: loading definition:"));
    }
}
