//! Bidirectional conversion between entities and persisted definitions
//!
//! The forward pipeline flattens an entity's keyed attribute map into the
//! ordered array-of-records form the definition store persists; the reverse
//! pipeline rebuilds the keyed map, re-expanding nested attributes and
//! collapsing records that carry nothing beyond their bare type back into
//! the tag shorthand. Both directions validate the shape invariants and
//! are pure apart from diagnostic logging.

use crate::attr::{AttrType, AttrTypeDef, EntityAttributes, OfType};
use crate::def::{AttributeRecord, EntityDef, EntityDefDocument};
use crate::entity::{Entity, EntityMethods};
use ermeta_core::{
    MetaError, MetaResult, OfTag, SimpleAttrType, Validatable, convert_default_value_by_type,
};
use tracing::warn;

// ============================================================================
// Entity -> Persisted Definition
// ============================================================================

/// Convert an entity into its persisted definition
///
/// Attribute records are produced in map order with fresh ids. The
/// `required` key is stripped when falsy (storage compaction), built-in
/// methods are excluded, and the resulting definition is validated before
/// it is returned.
///
/// `Entity::parent` and `Entity::options` have no stored counterpart:
/// parent linkage is owned by the definition store, and options never
/// leave the process.
pub fn entity_to_def(entity: &Entity) -> MetaResult<EntityDef> {
    let attributes = attributes_to_records(&entity.name, &entity.attributes)?;

    let def = EntityDef {
        namespace: entity.namespace.clone(),
        name: entity.name.clone(),
        label: entity.label.clone(),
        description: entity.description.clone(),
        prompts: None,
        entity_schema: None,
        attributes,
        methods: strip_built_in_methods(entity.methods.as_ref()),
        parent: None,
        object_title: entity.object_title.clone(),
        abc: entity.abc,
        dlg_form: entity.dlg_form.clone(),
        view_form: entity.view_form.clone(),
        system_fields: entity.system_fields.clone(),
    };

    def.validate()?;
    Ok(def)
}

fn attributes_to_records(
    entity_name: &str,
    attrs: &EntityAttributes,
) -> MetaResult<Vec<AttributeRecord>> {
    let mut records = Vec::with_capacity(attrs.len());

    for (attr_name, attr) in attrs.iter() {
        if attr_name.is_empty() {
            return Err(MetaError::MissingAttributeName {
                entity: entity_name.to_string(),
            });
        }

        let mut record = match attr {
            AttrType::Def(def) => def_to_record(entity_name, attr_name, def)?,
            AttrType::Simple(tag) => AttributeRecord::new(attr_name, *tag),
            AttrType::Array(elements) => {
                array_shorthand_to_record(entity_name, attr_name, elements)?
            }
            AttrType::Nested(_) | AttrType::Schema(_) => {
                warn!(
                    "Invalid attribute shape for '{}.{}', storing as string",
                    entity_name, attr_name
                );
                AttributeRecord::new(attr_name, SimpleAttrType::String)
            }
        };

        if record.required == Some(false) {
            record.required = None;
        }

        records.push(record);
    }

    Ok(records)
}

fn def_to_record(
    entity_name: &str,
    attr_name: &str,
    def: &AttrTypeDef,
) -> MetaResult<AttributeRecord> {
    // resolve the stored tag; the `type: [nestedAttrs]` rendering of
    // array-of-objects carries its element map in the type itself
    let (tag, nested_in_type) = match &def.attr_type {
        AttrType::Simple(tag) => (*tag, None),
        AttrType::Array(elements) => {
            if elements.len() != 1 {
                return Err(MetaError::InvalidArrayElement {
                    entity: entity_name.to_string(),
                    attribute: attr_name.to_string(),
                    message: "array type should have only one element".to_string(),
                });
            }
            match &elements[0] {
                AttrType::Nested(map) => (SimpleAttrType::Array, Some(map)),
                other => {
                    return Err(MetaError::InvalidArrayElement {
                        entity: entity_name.to_string(),
                        attribute: attr_name.to_string(),
                        message: format!(
                            "array type shorthand must wrap a nested attribute map, got {:?}",
                            other
                        ),
                    });
                }
            }
        }
        _ => {
            return Err(MetaError::attribute_validation(
                entity_name,
                attr_name,
                "attribute definitions must declare a simple type tag",
            ));
        }
    };

    let mut record = AttributeRecord::new(attr_name, tag);
    record.description = def.description.clone();
    record.required = def.required;
    record.nullable = def.nullable;
    record.enum_values = def.enum_values.clone();
    record.default = def.default.clone();
    record.min = def.min;
    record.max = def.max;
    record.minlength = def.minlength;
    record.maxlength = def.maxlength;
    record.trim = def.trim;
    record.lowercase = def.lowercase;
    record.uppercase = def.uppercase;
    record.pattern = def.pattern.clone();
    record.index = def.index;
    record.unique = def.unique;
    record.sparse = def.sparse;
    record.references_entity = def.references_entity.clone();
    record.label = def.label.clone();
    record.placeholder = def.placeholder.clone();
    record.tooltip = def.tooltip.clone();
    record.displayed_fields = def.displayed_fields.clone();
    record.readonly = def.readonly;
    record.hidden = def.hidden;
    record.system = def.system;

    if let Some(map) = nested_in_type {
        record.of = Some(OfTag::Object);
        record.nested_attributes = attributes_to_records(entity_name, map)?;
    } else if tag == SimpleAttrType::Array {
        match &def.of {
            Some(OfType::Tag(of_tag)) => {
                record.of = Some(*of_tag);
            }
            Some(OfType::Nested(map)) => {
                record.of = Some(OfTag::Object);
                record.nested_attributes = attributes_to_records(entity_name, map)?;
            }
            // caught by definition validation
            None => {}
        }
    }

    Ok(record)
}

fn array_shorthand_to_record(
    entity_name: &str,
    attr_name: &str,
    elements: &[AttrType],
) -> MetaResult<AttributeRecord> {
    if elements.len() != 1 {
        return Err(MetaError::InvalidArrayElement {
            entity: entity_name.to_string(),
            attribute: attr_name.to_string(),
            message: "array type should have only one element".to_string(),
        });
    }

    let mut record = AttributeRecord::new(attr_name, SimpleAttrType::Array);

    match &elements[0] {
        AttrType::Simple(tag) => {
            record.of = Some(OfTag::from_simple(*tag).ok_or_else(|| {
                MetaError::InvalidArrayElement {
                    entity: entity_name.to_string(),
                    attribute: attr_name.to_string(),
                    message: format!("'{}' is not a valid array element type", tag),
                }
            })?);
        }
        AttrType::Nested(map) => {
            record.of = Some(OfTag::Object);
            record.nested_attributes = attributes_to_records(entity_name, map)?;
        }
        other => {
            return Err(MetaError::InvalidArrayElement {
                entity: entity_name.to_string(),
                attribute: attr_name.to_string(),
                message: format!("unknown array element shape: {:?}", other),
            });
        }
    }

    Ok(record)
}

fn strip_built_in_methods(methods: Option<&EntityMethods>) -> Option<EntityMethods> {
    let methods = methods?;

    let kept: EntityMethods = methods
        .iter()
        .map(|(hook, list)| {
            let list: Vec<_> = list.iter().filter(|m| !m.is_built_in()).cloned().collect();
            (*hook, list)
        })
        .filter(|(_, list)| !list.is_empty())
        .collect();

    if kept.is_empty() { None } else { Some(kept) }
}

// ============================================================================
// Persisted Definition -> Entity
// ============================================================================

/// Convert a persisted definition document back into an entity
///
/// Array-of-object attributes are rendered as `{ type: "array", of: ... }`;
/// see [`def_to_entity_with`] for the `type: [nestedAttrs]` rendering.
pub fn def_to_entity(doc: &EntityDefDocument) -> MetaResult<Entity> {
    def_to_entity_with(doc, false)
}

/// Convert a persisted definition document back into an entity
///
/// With `use_arrays` set, nested/array-of-object attributes are rendered
/// through the `type: [nestedAttrs]` shorthand instead of the explicit
/// `{ type: "array", of: nestedAttrs }` form.
pub fn def_to_entity_with(doc: &EntityDefDocument, use_arrays: bool) -> MetaResult<Entity> {
    let def = &doc.def;
    def.validate()?;

    let attributes = records_to_attributes(&def.name, &def.attributes, use_arrays)?;

    Ok(Entity {
        parent: def.parent.clone(),
        namespace: def.namespace.clone(),
        name: def.name.clone(),
        label: def.label.clone(),
        description: def.description.clone(),
        object_title: def.object_title.clone(),
        attributes,
        options: None,
        methods: restore_methods(def.methods.as_ref()),
        system_fields: def.system_fields.clone(),
        abc: def.abc,
        view_form: def.view_form.clone(),
        dlg_form: def.dlg_form.clone(),
    })
}

fn records_to_attributes(
    entity_name: &str,
    records: &[AttributeRecord],
    use_arrays: bool,
) -> MetaResult<EntityAttributes> {
    let mut attrs = EntityAttributes::new();

    for record in records {
        if record.name.is_empty() {
            return Err(MetaError::MissingAttributeName {
                entity: entity_name.to_string(),
            });
        }

        let mut def = if record.attr_type == SimpleAttrType::Array
            && record.of == Some(OfTag::Object)
        {
            if record.nested_attributes.is_empty() {
                return Err(MetaError::attribute_validation(
                    entity_name,
                    &record.name,
                    "'nestedAttributes' is required when type is 'array' and of is 'object'",
                ));
            }
            // nested elements always use the explicit rendering
            let nested = records_to_attributes(entity_name, &record.nested_attributes, false)?;

            if use_arrays {
                AttrTypeDef {
                    attr_type: AttrType::Array(vec![AttrType::Nested(nested)]),
                    required: record.required,
                    nullable: record.nullable,
                    default: record.default.clone(),
                    ..Default::default()
                }
            } else {
                AttrTypeDef {
                    attr_type: AttrType::Simple(SimpleAttrType::Array),
                    required: record.required,
                    nullable: record.nullable,
                    of: Some(OfType::Nested(nested)),
                    ..Default::default()
                }
            }
        } else {
            let default = convert_default_value_by_type(
                entity_name,
                &record.name,
                record.attr_type,
                record.default.as_ref(),
            );

            // the reserved identity field never carries uniqueness or an
            // index, regardless of what the stored record claims
            let (unique, index) = if record.name == "_id" {
                (Some(false), Some(false))
            } else {
                (record.unique, record.index)
            };

            AttrTypeDef {
                attr_type: AttrType::Simple(record.attr_type),
                required: record.required,
                nullable: record.nullable,
                default,
                enum_values: record.enum_values.clone().filter(|v| !v.is_empty()),
                min: record.min,
                max: record.max,
                minlength: record.minlength,
                maxlength: record.maxlength,
                trim: record.trim,
                lowercase: record.lowercase,
                uppercase: record.uppercase,
                pattern: record.pattern.clone(),
                index,
                unique,
                sparse: record.sparse,
                references_entity: record.references_entity.clone(),
                of: record.of.map(OfType::Tag),
                readonly: record.readonly.filter(|b| *b),
                system: record.system.filter(|b| *b),
                hidden: record.hidden.filter(|b| *b),
                ..Default::default()
            }
        };

        // presentation metadata applies to both renderings
        def.label = record.label.clone();
        def.description = record.description.clone();
        def.placeholder = record.placeholder.clone();
        def.tooltip = record.tooltip.clone();
        if def.hidden.is_none() {
            def.hidden = record.hidden.filter(|b| *b);
        }
        def.displayed_fields = record.displayed_fields.clone().filter(|v| !v.is_empty());

        attrs.insert(&record.name, def.collapse());
    }

    Ok(attrs)
}

fn restore_methods(methods: Option<&EntityMethods>) -> Option<EntityMethods> {
    let methods = methods?;

    let kept: EntityMethods = methods
        .iter()
        .filter(|(_, list)| !list.is_empty())
        .map(|(hook, list)| (*hook, list.clone()))
        .collect();

    if kept.is_empty() { None } else { Some(kept) }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use ermeta_core::{DisplayedField, MethodType, SystemFieldName, SystemFields};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn round_trip(entity: &Entity) -> Entity {
        let def = entity_to_def(entity).expect("entity_to_def failed");
        let doc = EntityDefDocument::new("65f0123456789abcdef01234", def);
        def_to_entity(&doc).expect("def_to_entity failed")
    }

    #[test]
    fn test_round_trip_law_over_fixtures() {
        for entity in fixtures::system_entities() {
            let reduced = entity.reduce();
            let reverse = round_trip(&reduced);
            assert_eq!(reverse, reduced, "round trip failed for {}", entity.name);

            // converting the unreduced entity lands on the same reduced form
            let direct = round_trip(&entity);
            assert_eq!(direct, reduced, "direct conversion differs for {}", entity.name);
        }
    }

    #[test]
    fn test_records_preserve_attribute_order() {
        let entity = fixtures::test_entity();
        let def = entity_to_def(&entity).unwrap();

        let stored: Vec<&str> = def.attributes.iter().map(|r| r.name.as_str()).collect();
        let declared: Vec<&str> = entity.attributes.keys().collect();
        assert_eq!(stored, declared);
    }

    #[test]
    fn test_fresh_ids_per_conversion() {
        let entity = fixtures::test_entity();
        let first = entity_to_def(&entity).unwrap();
        let second = entity_to_def(&entity).unwrap();

        for (a, b) in first.attributes.iter().zip(&second.attributes) {
            assert_ne!(a.id, b.id, "ids must be regenerated on every call");
        }
    }

    #[test]
    fn test_required_false_is_stripped() {
        let entity = Entity::new("Test").with_attribute(
            "note",
            AttrTypeDef {
                required: Some(false),
                label: Some("Note".to_string()),
                ..AttrTypeDef::of_type(SimpleAttrType::String)
            },
        );

        let def = entity_to_def(&entity).unwrap();
        assert_eq!(def.attributes[0].required, None);
        assert_eq!(def.attributes[0].label.as_deref(), Some("Note"));
    }

    #[test]
    fn test_reference_attribute_round_trip() {
        let entity = Entity::new("ChatHistory").with_attribute(
            "userId",
            AttrTypeDef::of_type(SimpleAttrType::ObjectId)
                .required()
                .references("User")
                .with_displayed_fields([DisplayedField::new("name")]),
        );

        let def = entity_to_def(&entity).unwrap();
        let record = def.attribute("userId").unwrap();
        assert_eq!(record.references_entity.as_deref(), Some("User"));
        assert_eq!(record.displayed_fields.as_ref().unwrap().len(), 1);

        let back = def_to_entity(&EntityDefDocument::with_generated_id(def)).unwrap();
        assert_eq!(back.attributes.get("userId"), entity.attributes.get("userId"));
    }

    #[test]
    fn test_array_of_references() {
        let entity = Entity::new("User").with_attribute(
            "roles",
            AttrTypeDef::of_type(SimpleAttrType::Array)
                .with_of(OfTag::ObjectId)
                .references("Role")
                .with_displayed_fields([DisplayedField::new("name").readonly()])
                .required(),
        );

        let def = entity_to_def(&entity).unwrap();
        let record = def.attribute("roles").unwrap();
        assert_eq!(record.of, Some(OfTag::ObjectId));
        assert_eq!(record.references_entity.as_deref(), Some("Role"));
        assert!(record.nested_attributes.is_empty());

        let back = def_to_entity(&EntityDefDocument::with_generated_id(def)).unwrap();
        assert_eq!(back.attributes.get("roles"), entity.attributes.get("roles"));
    }

    #[test]
    fn test_array_of_nested_objects() {
        let nested = EntityAttributes::new()
            .with(
                "role",
                AttrTypeDef::of_type(SimpleAttrType::String)
                    .required()
                    .with_enum(["system", "user", "assistant"]),
            )
            .with(
                "content",
                AttrTypeDef::of_type(SimpleAttrType::String).required(),
            )
            .with("debugInfo", SimpleAttrType::String);

        let entity = Entity::new("ChatHistory").with_attribute(
            "data",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(nested.clone()),
        );

        let def = entity_to_def(&entity).unwrap();
        let record = def.attribute("data").unwrap();
        assert_eq!(record.of, Some(OfTag::Object));
        assert_eq!(record.nested_attributes.len(), 3);
        assert_eq!(record.nested_attributes[0].name, "role");
        assert_eq!(
            record.nested_attributes[0].enum_values,
            Some(vec![json!("system"), json!("user"), json!("assistant")])
        );
        // the bare nested element stays a bare tag
        assert_eq!(record.nested_attributes[2].attr_type, SimpleAttrType::String);

        let back = def_to_entity(&EntityDefDocument::with_generated_id(def)).unwrap();
        let back_def = back.attributes.get("data").unwrap().as_def().unwrap();
        assert_eq!(back_def.of.as_ref().unwrap().as_nested(), Some(&nested));
    }

    #[test]
    fn test_use_arrays_rendering() {
        let nested = EntityAttributes::new().with(
            "stage",
            AttrTypeDef::of_type(SimpleAttrType::String).required(),
        );
        let entity = Entity::new("Project").with_attribute(
            "stages",
            AttrTypeDef::of_type(SimpleAttrType::Array)
                .with_of(nested.clone())
                .required(),
        );

        let def = entity_to_def(&entity).unwrap();
        let doc = EntityDefDocument::with_generated_id(def);

        let explicit = def_to_entity_with(&doc, false).unwrap();
        let via_arrays = def_to_entity_with(&doc, true).unwrap();

        let explicit_def = explicit.attributes.get("stages").unwrap().as_def().unwrap();
        assert_eq!(
            explicit_def.attr_type,
            AttrType::Simple(SimpleAttrType::Array)
        );
        assert_eq!(explicit_def.of.as_ref().unwrap().as_nested(), Some(&nested));

        let arrays_def = via_arrays.attributes.get("stages").unwrap().as_def().unwrap();
        assert_eq!(
            arrays_def.attr_type,
            AttrType::Array(vec![AttrType::Nested(nested)])
        );
        assert_eq!(arrays_def.of, None);
    }

    #[test]
    fn test_array_shorthand_of_simple_type() {
        let entity =
            Entity::new("Test").with_attribute("tags", AttrType::array_of(SimpleAttrType::String));

        let def = entity_to_def(&entity).unwrap();
        let record = def.attribute("tags").unwrap();
        assert_eq!(record.attr_type, SimpleAttrType::Array);
        assert_eq!(record.of, Some(OfTag::String));

        // the shorthand reads back as the explicit array definition
        let back = def_to_entity(&EntityDefDocument::with_generated_id(def)).unwrap();
        let back_def = back.attributes.get("tags").unwrap().as_def().unwrap();
        assert_eq!(back_def.of, Some(OfType::Tag(OfTag::String)));
    }

    #[test]
    fn test_array_shorthand_errors() {
        let two = Entity::new("Test").with_attribute(
            "bad",
            AttrType::Array(vec![
                AttrType::Simple(SimpleAttrType::String),
                AttrType::Simple(SimpleAttrType::Number),
            ]),
        );
        assert!(entity_to_def(&two).is_err());

        let bad_element = Entity::new("Test")
            .with_attribute("bad", AttrType::array_of(SimpleAttrType::Map));
        assert!(entity_to_def(&bad_element).is_err());
    }

    #[test]
    fn test_id_attribute_immunity() {
        let mut record = AttributeRecord::new("_id", SimpleAttrType::ObjectId);
        record.unique = Some(true);
        record.index = Some(true);
        record.references_entity = Some("Self".to_string());
        record.displayed_fields = Some(vec![DisplayedField::new("_id")]);

        let def = EntityDef {
            namespace: None,
            name: "Test".to_string(),
            label: None,
            description: None,
            prompts: None,
            entity_schema: None,
            attributes: vec![record],
            methods: None,
            parent: None,
            object_title: None,
            abc: None,
            dlg_form: None,
            view_form: None,
            system_fields: None,
        };

        let entity = def_to_entity(&EntityDefDocument::with_generated_id(def)).unwrap();
        let def = entity.attributes.get("_id").unwrap().as_def().unwrap();
        assert_eq!(def.unique, Some(false));
        assert_eq!(def.index, Some(false));
    }

    #[test]
    fn test_built_in_methods_excluded() {
        let entity = fixtures::test_entity();
        let def = entity_to_def(&entity).unwrap();
        let methods = def.methods.unwrap();

        // beforeSubmit survives, the built-in afterSubmit group is dropped
        assert!(methods.contains_key(&MethodType::BeforeSubmit));
        assert!(!methods.contains_key(&MethodType::AfterSubmit));
    }

    #[test]
    fn test_default_values_survive_round_trip() {
        let entity = Entity::new("Command")
            .with_attribute(
                "vat",
                AttrTypeDef::of_type(SimpleAttrType::Number)
                    .required()
                    .with_default(20),
            )
            .with_attribute(
                "cmd",
                AttrTypeDef::of_type(SimpleAttrType::String)
                    .trimmed()
                    .with_default(serde_json::Value::Null),
            );

        let back = round_trip(&entity);
        assert_eq!(
            back.attributes.get("vat").unwrap().as_def().unwrap().default,
            Some(json!(20))
        );
        assert_eq!(
            back.attributes.get("cmd").unwrap().as_def().unwrap().default,
            Some(serde_json::Value::Null)
        );
    }

    #[test]
    fn test_unusable_default_degrades_softly() {
        let mut record = AttributeRecord::new("count", SimpleAttrType::Number);
        record.default = Some(json!("abc"));

        let def = EntityDef {
            namespace: None,
            name: "Test".to_string(),
            label: None,
            description: None,
            prompts: None,
            entity_schema: None,
            attributes: vec![record],
            methods: None,
            parent: None,
            object_title: None,
            abc: None,
            dlg_form: None,
            view_form: None,
            system_fields: None,
        };

        // no error: the attribute comes back default-less
        let entity = def_to_entity(&EntityDefDocument::with_generated_id(def)).unwrap();
        assert_eq!(
            entity.attributes.get("count"),
            Some(&AttrType::Simple(SimpleAttrType::Number))
        );
    }

    #[test]
    fn test_system_fields_preserved() {
        let all = Entity::new("SystemFieldsAll")
            .with_namespace("sys")
            .with_attribute(
                "value",
                AttrTypeDef::of_type(SimpleAttrType::String).required(),
            )
            .with_system_fields(true);
        assert_eq!(
            round_trip(&all).system_fields,
            Some(SystemFields::All(true))
        );

        let disabled = all.clone().with_system_fields(false);
        assert_eq!(
            round_trip(&disabled).system_fields,
            Some(SystemFields::All(false))
        );

        let selective = all.clone().with_system_fields(SystemFields::from_value(
            &json!({ "createdBy": true, "updatedAt": false }),
        ).unwrap());
        let restored = round_trip(&selective).system_fields.unwrap();
        assert!(restored.is_enabled(SystemFieldName::CreatedBy));
        assert!(restored.is_disabled(SystemFieldName::UpdatedAt));
    }

    #[test]
    fn test_empty_enum_is_a_hard_error_both_ways() {
        let entity = Entity::new("Test").with_attribute(
            "state",
            AttrTypeDef::of_type(SimpleAttrType::String).with_enum(Vec::<serde_json::Value>::new()),
        );
        assert!(entity_to_def(&entity).is_err());

        let mut record = AttributeRecord::new("state", SimpleAttrType::String);
        record.enum_values = Some(vec![]);
        let def = EntityDef {
            namespace: None,
            name: "Test".to_string(),
            label: None,
            description: None,
            prompts: None,
            entity_schema: None,
            attributes: vec![record],
            methods: None,
            parent: None,
            object_title: None,
            abc: None,
            dlg_form: None,
            view_form: None,
            system_fields: None,
        };
        assert!(def_to_entity(&EntityDefDocument::with_generated_id(def)).is_err());
    }

    #[test]
    fn test_missing_attribute_name_errors() {
        let entity = Entity::new("Test").with_attribute("", SimpleAttrType::String);
        let err = entity_to_def(&entity).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_wire_round_trip_through_json() {
        use ermeta_core::Persistable;

        let entity = fixtures::chat_history_entity().reduce();
        let def = entity_to_def(&entity).unwrap();
        let doc = EntityDefDocument::with_generated_id(def);

        let json = doc.to_json().unwrap();
        let parsed = EntityDefDocument::from_json(&json).unwrap();
        assert_eq!(parsed, doc);

        let back = def_to_entity(&parsed).unwrap();
        assert_eq!(back, entity);
    }
}
