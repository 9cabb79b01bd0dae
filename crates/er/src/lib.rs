//! # Ermeta ER
//!
//! Entity-relationship metadata for the Ermeta engine: a declarative way to
//! describe entities (attributes, validation rules, relationships, UI
//! hints, lifecycle methods) and convert those descriptions bidirectionally
//! between the in-memory representation, the persisted definition form and
//! a concrete document-database schema.
//!
//! ## Core Concepts
//!
//! - **AttrType**: the recursive attribute-type algebra (bare tags,
//!   descriptive definitions, nested maps, embedded entities, arrays)
//! - **Entity**: the in-memory, developer-facing description of a record
//!   type
//! - **EntityDef**: the storage-encoded, array-based counterpart of an
//!   entity
//! - **Schema**: the compiled storage schema used to validate and persist
//!   records
//! - **Registry**: process-wide name-to-value lookup for live entities and
//!   models
//!

// Module declarations
pub mod attr;
pub mod convert;
pub mod def;
pub mod entity;
pub mod fixtures;
pub mod meta;
pub mod model;
pub mod registry;
pub mod schema;
pub mod storage;

// Re-export commonly used types at crate root
pub use attr::{
    AttrType, AttrTypeDef, EntityAttributes, EntitySchema, OfType, ResolvedAttrType,
    SchemaOptions, validate_attr_type,
};
pub use convert::{def_to_entity, def_to_entity_with, entity_to_def};
pub use def::{
    AttributeRecord, EntityDef, EntityDefDocument, PromptDef, generate_object_id, is_object_id,
};
pub use entity::{Entity, EntityMethods, Method, MethodCode, MethodFuture, MethodHook, MethodParam};
pub use meta::{base_entity, entity_def_entity};
pub use model::Model;
pub use registry::{EntityRegistry, Getter, GetterFuture, ModelRegistry, Registry};
pub use schema::{
    FieldSchema, Schema, SchemaColumn, SchemaDefault, SchemaNode, compile_schema,
    compile_schema_with, map_simple_type, method_schema,
};
pub use storage::{DefinitionFilter, DefinitionStore, MemoryDefinitionStore};

// Re-export core types that are commonly used with the ER layer
pub use ermeta_core::{
    ALL_SYSTEM_FIELD_NAMES, DisplayedField, EMAIL_PATTERN, METHOD_TYPES, MetaError, MetaResult,
    MethodEnvironment, MethodType, ObjectTitle, OfTag, SimpleAttrType, SystemFieldName,
    SystemFields, Validatable, convert_default_value_by_type,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        AttrType,
        AttrTypeDef,
        DisplayedField,
        // Core types
        Entity,
        EntityAttributes,
        EntityDef,
        EntityDefDocument,
        EntityRegistry,
        MetaError,
        MetaResult,
        Method,
        MethodEnvironment,
        MethodType,
        Model,
        ModelRegistry,
        OfTag,
        Registry,
        Schema,
        SimpleAttrType,
        SystemFields,
        Validatable,
        // Operations
        compile_schema,
        def_to_entity,
        entity_to_def,
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_exposes_the_pipeline() {
        use prelude::*;

        let entity = Entity::new("Smoke").with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        );

        let def = entity_to_def(&entity).unwrap();
        let doc = EntityDefDocument::with_generated_id(def);
        let restored = def_to_entity(&doc).unwrap();
        assert_eq!(restored, entity);

        let schema = compile_schema(&restored).unwrap();
        assert!(schema.has_path("name"));
    }
}
