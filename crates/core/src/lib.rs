//! # Ermeta Core
//!
//! Core types, traits, and error handling for the Ermeta metadata engine.
//!
//! This crate provides the foundational building blocks used throughout
//! the Ermeta ecosystem, including:
//!
//! - **Types**: the fixed attribute-type tag set, method types and
//!   environments, system-field configuration, displayed fields
//! - **Normalization**: default-value coercion with soft failure semantics
//! - **Traits**: common behaviors like `Validatable` and `Persistable`
//! - **Errors**: unified error handling with `MetaError` and `MetaResult`
//!

pub mod error;
pub mod normalize;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{MetaError, MetaResult, ResultExt};
pub use normalize::{
    EMAIL_PATTERN, convert_default_value_by_type, is_now_sentinel, parse_date_value,
};
pub use traits::{Named, Persistable, Validatable};
pub use types::{
    ALL_SYSTEM_FIELD_NAMES, CLIENT_METHOD_TYPES, DisplayedField, METHOD_TYPES, MethodEnvironment,
    MethodType, ObjectTitle, OfTag, SERVER_METHOD_TYPES, SimpleAttrType, SystemFieldName,
    SystemFields, deserialize_explicit_value, deserialize_system_fields,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
