//! Self-describing metadata
//!
//! The definition store itself is described by an entity: `sys:EntityDef`
//! carries the recursive attribute-record definition (nested to a fixed
//! depth), and `sys:BaseEntity` is the abstract root every stored
//! definition inherits from.

use crate::attr::{AttrType, AttrTypeDef, EntityAttributes};
use crate::entity::Entity;
use ermeta_core::{OfTag, SimpleAttrType};

/// Nesting depth of the recursive attribute definition
const ATTRIBUTE_DEF_DEPTH: u32 = 3;

/// The abstract root entity of the `sys` namespace
pub fn base_entity() -> Entity {
    Entity::new("BaseEntity")
        .with_namespace("sys")
        .abstract_base()
}

/// The entity describing stored entity definitions
pub fn entity_def_entity() -> Entity {
    Entity::new("EntityDef")
        .with_namespace("sys")
        .with_parent("sys:BaseEntity")
        .with_attribute(
            "namespace",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .trimmed()
                .with_length(2, 255),
        )
        .with_attribute(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .trimmed()
                .with_length(2, 60),
        )
        .with_attribute(
            "label",
            AttrTypeDef::of_type(SimpleAttrType::String).trimmed(),
        )
        .with_attribute("description", description_attr())
        .with_attribute(
            "prompts",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(prompt_attributes()),
        )
        .with_attribute("entitySchema", SimpleAttrType::String)
        .with_attribute(
            "attributes",
            AttrType::array_of(attribute_def(ATTRIBUTE_DEF_DEPTH)),
        )
        .with_attribute(
            "methods",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Map)
            },
        )
        .with_attribute(
            "parent",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String)
            },
        )
        .with_attribute("objectTitle", SimpleAttrType::String)
        .with_attribute(
            "abc",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::Boolean)
            },
        )
        .with_attribute("dlgForm", SimpleAttrType::String)
        .with_attribute("viewForm", SimpleAttrType::String)
}

fn description_attr() -> AttrTypeDef {
    AttrTypeDef {
        maxlength: Some(255),
        ..AttrTypeDef::of_type(SimpleAttrType::String).trimmed()
    }
}

fn prompt_attributes() -> EntityAttributes {
    EntityAttributes::new()
        .with(
            "namespace",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .trimmed()
                .with_length(2, 255),
        )
        .with(
            "prompt",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .trimmed()
                .with_length(2, 32767),
        )
        .with("disabled", SimpleAttrType::Boolean)
}

/// The recursive attribute-record definition
///
/// `nestedAttributes` recurses one level shallower each time and is omitted
/// at the innermost level.
fn attribute_def(depth: u32) -> EntityAttributes {
    let mut attrs = EntityAttributes::new()
        .with(
            "name",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .trimmed()
                .with_length(2, 60),
        )
        .with(
            "type",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .required()
                .with_enum(SimpleAttrType::all().iter().map(|t| t.as_str())),
        )
        .with("required", SimpleAttrType::Boolean)
        .with("nullable", SimpleAttrType::Boolean)
        .with("default", SimpleAttrType::String)
        .with(
            "enum",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(OfTag::String),
        )
        .with("min", SimpleAttrType::Number)
        .with("max", SimpleAttrType::Number)
        .with("minlength", SimpleAttrType::Number)
        .with("maxlength", SimpleAttrType::Number)
        .with("trim", SimpleAttrType::Boolean)
        .with("lowercase", SimpleAttrType::Boolean)
        .with("uppercase", SimpleAttrType::Boolean)
        .with("match", SimpleAttrType::String)
        .with("index", SimpleAttrType::Boolean)
        .with("unique", SimpleAttrType::Boolean)
        .with("sparse", SimpleAttrType::Boolean)
        .with("referencesEntity", SimpleAttrType::String)
        .with("label", SimpleAttrType::String)
        .with("description", description_attr())
        .with("placeholder", SimpleAttrType::String)
        .with("tooltip", SimpleAttrType::String)
        .with(
            "of",
            AttrTypeDef::of_type(SimpleAttrType::String)
                .with_enum(["string", "number", "boolean", "timestamp", "objectid", "entity", "object"]),
        )
        .with(
            "displayedFields",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(displayed_field_attributes()),
        );

    if depth > 1 {
        attrs.insert(
            "nestedAttributes",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(attribute_def(depth - 1)),
        );
    }

    attrs
        .with("namespace", SimpleAttrType::String)
        .with(
            "readonly",
            AttrTypeDef::of_type(SimpleAttrType::Boolean).with_default(false),
        )
        .with(
            "hidden",
            AttrTypeDef::of_type(SimpleAttrType::Boolean).with_default(false),
        )
        .with(
            "system",
            AttrTypeDef::of_type(SimpleAttrType::Boolean).with_default(false),
        )
}

fn displayed_field_attributes() -> EntityAttributes {
    EntityAttributes::new()
        .with(
            "field",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        )
        .with(
            "readonly",
            AttrTypeDef::of_type(SimpleAttrType::Boolean).with_default(true),
        )
        .with(
            "hidden",
            AttrTypeDef::of_type(SimpleAttrType::Boolean).with_default(false),
        )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{def_to_entity, entity_to_def};
    use crate::def::EntityDefDocument;
    use crate::schema::compile_schema;
    use ermeta_core::Validatable;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_meta_entities_validate() {
        assert!(base_entity().validate().is_ok());
        assert!(entity_def_entity().validate().is_ok());
    }

    #[test]
    fn test_attribute_def_recursion_is_bounded() {
        let top = attribute_def(ATTRIBUTE_DEF_DEPTH);
        let level2 = top
            .get("nestedAttributes")
            .and_then(|a| a.as_def())
            .and_then(|d| d.of.as_ref())
            .and_then(|of| of.as_nested())
            .expect("level 2 nested attributes");
        let level3 = level2
            .get("nestedAttributes")
            .and_then(|a| a.as_def())
            .and_then(|d| d.of.as_ref())
            .and_then(|of| of.as_nested())
            .expect("level 3 nested attributes");
        assert!(!level3.contains("nestedAttributes"));
    }

    #[test]
    fn test_entity_def_converts_to_definition() {
        let entity = entity_def_entity();
        let def = entity_to_def(&entity).unwrap();

        let attributes = def.attribute("attributes").unwrap();
        assert_eq!(attributes.of, Some(OfTag::Object));
        assert!(
            attributes
                .nested_attributes
                .iter()
                .any(|r| r.name == "type" && r.enum_values.is_some())
        );
    }

    #[test]
    fn test_entity_def_round_trips_without_parent() {
        use crate::attr::OfType;

        let entity = entity_def_entity();
        let def = entity_to_def(&entity).unwrap();
        let restored = def_to_entity(&EntityDefDocument::with_generated_id(def)).unwrap();

        // parent linkage is owned by the definition store, and the
        // `[attributeDef]` array shorthand reads back in the explicit
        // `{ type: "array", of: ... }` rendering
        let mut expected = entity.reduce();
        expected.parent = None;
        expected.attributes.insert(
            "attributes",
            AttrTypeDef {
                attr_type: AttrType::Simple(SimpleAttrType::Array),
                of: Some(OfType::Nested(attribute_def(ATTRIBUTE_DEF_DEPTH))),
                ..Default::default()
            },
        );
        assert_eq!(restored, expected);
    }

    #[test]
    fn test_entity_def_schema_compiles() {
        let schema = compile_schema(&entity_def_entity()).unwrap();
        assert!(schema.has_path("attributes"));
        assert!(schema.has_path("name"));
        // `parent` is both a declared attribute and the implicit parent path
        assert!(schema.has_path("parent"));
    }

    #[test]
    fn test_base_entity_is_abstract() {
        let base = base_entity();
        assert_eq!(base.abc, Some(true));
        assert!(base.attributes.is_empty());
        assert_eq!(base.full_name(), "sys:BaseEntity");
    }
}
