//! Persisted entity definitions
//!
//! Entities are stored in the definition collection as documents whose
//! `attributes` are an ordered array of flat records rather than a keyed
//! map. This module contains those storage-facing types and the validation
//! of their shape invariants.

use crate::entity::EntityMethods;
use ermeta_core::{
    DisplayedField, MetaError, MetaResult, Named, ObjectTitle, OfTag, Persistable,
    SimpleAttrType, SystemFields, Validatable, deserialize_explicit_value,
    deserialize_system_fields,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Object Identifiers
// ============================================================================

/// Generate an opaque 24-hex-character object id
///
/// 4 timestamp bytes followed by 8 random bytes, matching the id format of
/// the definition store. Ids are regenerated on every conversion; they are
/// not persisted identity.
pub fn generate_object_id() -> String {
    let seconds = chrono::Utc::now().timestamp().max(0) as u32;
    let entropy = uuid::Uuid::new_v4();
    let mut id = format!("{:08x}", seconds);
    for byte in &entropy.as_bytes()[..8] {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}

/// Check that a string is a well-formed object id
pub fn is_object_id(value: &str) -> bool {
    value.len() == 24 && value.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// AttributeRecord
// ============================================================================

/// One stored attribute of a persisted entity definition
///
/// The flattened counterpart of an attribute-map entry: the name moves into
/// the record, the type becomes a bare tag, and nested or array-of-object
/// attributes carry their element shape in `of`/`nested_attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRecord {
    /// Generated unique identifier, fresh per conversion
    #[serde(rename = "_id", default = "generate_object_id")]
    pub id: String,

    /// Attribute name
    pub name: String,

    /// The stored type tag
    #[serde(rename = "type")]
    pub attr_type: SimpleAttrType,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether a value is mandatory; never stored as `false`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Whether an explicit null is a legal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    /// Allowed values; must be non-empty when present
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Declared default value, stored raw
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_explicit_value"
    )]
    pub default: Option<Value>,

    /// Minimum numeric value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Maximum numeric value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Minimum string length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minlength: Option<u32>,

    /// Maximum string length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlength: Option<u32>,

    /// Trim surrounding whitespace on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<bool>,

    /// Lowercase the value on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowercase: Option<bool>,

    /// Uppercase the value on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uppercase: Option<bool>,

    /// Pattern the value must match; only legal on string attributes
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Create an index for this attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,

    /// Enforce uniqueness
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,

    /// Sparse index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse: Option<bool>,

    /// Full name of the referenced entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_entity: Option<String>,

    /// Label for use in the user interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Placeholder text for input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Tooltip text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// Element type of an array attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub of: Option<OfTag>,

    /// Fields of the referenced entity to surface when rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_fields: Option<Vec<DisplayedField>>,

    /// Element records of an array-of-objects attribute
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_attributes: Vec<AttributeRecord>,

    /// Namespace of the attribute definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Read-only in forms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,

    /// Hidden from default views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    /// Framework-managed attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

impl AttributeRecord {
    /// Create a record with a fresh id and the given name and type tag
    pub fn new(name: impl Into<String>, attr_type: SimpleAttrType) -> Self {
        Self {
            id: generate_object_id(),
            name: name.into(),
            attr_type,
            description: None,
            required: None,
            nullable: None,
            enum_values: None,
            default: None,
            min: None,
            max: None,
            minlength: None,
            maxlength: None,
            trim: None,
            lowercase: None,
            uppercase: None,
            pattern: None,
            index: None,
            unique: None,
            sparse: None,
            references_entity: None,
            label: None,
            placeholder: None,
            tooltip: None,
            of: None,
            displayed_fields: None,
            nested_attributes: Vec::new(),
            namespace: None,
            readonly: None,
            hidden: None,
            system: None,
        }
    }
}

impl Validatable for AttributeRecord {
    fn validate(&self) -> MetaResult<()> {
        let fail = |message: &str| Err(MetaError::validation(message.to_string()));

        if self.name.is_empty() {
            return fail("attribute name is required");
        }

        if let Some(values) = &self.enum_values {
            if values.is_empty() {
                return fail("empty enum array");
            }
        }

        if self.attr_type == SimpleAttrType::Enum && self.enum_values.is_none() {
            return fail("'enum' is required when type is 'enum'");
        }

        if let Some(fields) = &self.displayed_fields {
            if fields.is_empty() {
                return fail("empty displayedFields array");
            }
        }

        if self.pattern.is_some() && self.attr_type != SimpleAttrType::String {
            return fail("'match' can only be used with type 'string'");
        }

        if self.attr_type == SimpleAttrType::Array {
            let Some(of) = self.of else {
                return fail("'of' is required when type is 'array'");
            };
            if of == OfTag::Object {
                if self.nested_attributes.is_empty() {
                    return fail(
                        "'nestedAttributes' is required when type is 'array' and of is 'object'",
                    );
                }
                for nested in &self.nested_attributes {
                    nested.validate()?;
                }
            }
        } else if !self.nested_attributes.is_empty() {
            return fail("'nestedAttributes' is only valid for arrays of objects");
        }

        let is_reference = self.attr_type.is_reference()
            || (self.attr_type == SimpleAttrType::Array
                && self.of.is_some_and(|t| t.is_reference()));

        if is_reference && self.references_entity.is_none() {
            return fail("'referencesEntity' is required when type is 'objectid' or 'entity'");
        }

        if self.references_entity.is_some() && self.displayed_fields.is_none() {
            return fail("'displayedFields' is required when 'referencesEntity' is present");
        }

        Ok(())
    }
}

// ============================================================================
// EntityDef
// ============================================================================

/// A prompt attached to a persisted entity definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDef {
    /// Namespace the prompt belongs to
    pub namespace: String,

    /// Prompt text
    pub prompt: String,

    /// Whether the prompt is disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

/// The storage-facing counterpart of an `Entity`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDef {
    /// Namespace the entity belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the entity
    pub name: String,

    /// Label for use in the user interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Attached prompts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<PromptDef>>,

    /// Serialized sub-schema reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_schema: Option<String>,

    /// The stored attribute records, in display order
    pub attributes: Vec<AttributeRecord>,

    /// Stored methods grouped by hook; built-in methods are excluded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<EntityMethods>,

    /// Parent definition reference, owned by the definition store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Object title template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_title: Option<ObjectTitle>,

    /// Abstract base entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abc: Option<bool>,

    /// Custom dialog form page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlg_form: Option<String>,

    /// Custom view form page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_form: Option<String>,

    /// Configuration of the implicit system fields
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_system_fields"
    )]
    pub system_fields: Option<SystemFields>,
}

impl EntityDef {
    /// Look up a stored attribute record by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeRecord> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get the full name, including the namespace when present
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

impl Validatable for EntityDef {
    fn validate(&self) -> MetaResult<()> {
        if self.name.is_empty() {
            return Err(MetaError::entity_validation(
                &self.name,
                "Entity name cannot be empty",
            ));
        }

        for record in &self.attributes {
            if record.name.is_empty() {
                return Err(MetaError::MissingAttributeName {
                    entity: self.name.clone(),
                });
            }
            record.validate().map_err(|e| {
                MetaError::attribute_validation(&self.name, &record.name, e.to_string())
            })?;
        }

        Ok(())
    }
}

impl Named for EntityDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Persistable for EntityDef {}

// ============================================================================
// EntityDefDocument
// ============================================================================

/// A persisted definition as read from the definition store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefDocument {
    /// Store-assigned document id
    #[serde(rename = "_id")]
    pub id: String,

    /// The definition itself
    #[serde(flatten)]
    pub def: EntityDef,
}

impl EntityDefDocument {
    /// Wrap a definition with a store-assigned id
    pub fn new(id: impl Into<String>, def: EntityDef) -> Self {
        Self { id: id.into(), def }
    }

    /// Wrap a definition with a freshly generated id
    pub fn with_generated_id(def: EntityDef) -> Self {
        Self {
            id: generate_object_id(),
            def,
        }
    }
}

impl Validatable for EntityDefDocument {
    fn validate(&self) -> MetaResult<()> {
        self.def.validate()
    }
}

impl Persistable for EntityDefDocument {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_object_id() {
        let id = generate_object_id();
        assert_eq!(id.len(), 24);
        assert!(is_object_id(&id));

        let other = generate_object_id();
        assert_ne!(id, other);
    }

    #[test]
    fn test_is_object_id() {
        assert!(is_object_id("0123456789abcdef01234567"));
        assert!(!is_object_id("0123456789abcdef0123456"));
        assert!(!is_object_id("0123456789abcdef0123456g"));
        assert!(!is_object_id(""));
    }

    #[test]
    fn test_record_validation_enum() {
        let mut record = AttributeRecord::new("state", SimpleAttrType::Enum);
        assert!(record.validate().is_err());

        record.enum_values = Some(vec![]);
        assert!(record.validate().is_err());

        record.enum_values = Some(vec![json!("one")]);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_record_validation_array() {
        let mut record = AttributeRecord::new("items", SimpleAttrType::Array);
        assert!(record.validate().is_err());

        record.of = Some(OfTag::String);
        assert!(record.validate().is_ok());

        record.of = Some(OfTag::Object);
        assert!(record.validate().is_err());

        record.nested_attributes = vec![AttributeRecord::new("role", SimpleAttrType::String)];
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_record_validation_references() {
        let mut record = AttributeRecord::new("owner", SimpleAttrType::ObjectId);
        assert!(record.validate().is_err());

        record.references_entity = Some("sys:User".to_string());
        assert!(record.validate().is_err());

        record.displayed_fields = Some(vec![DisplayedField::new("name")]);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_record_validation_match() {
        let mut record = AttributeRecord::new("count", SimpleAttrType::Number);
        record.pattern = Some("[0-9]+".to_string());
        assert!(record.validate().is_err());

        let mut record = AttributeRecord::new("code", SimpleAttrType::String);
        record.pattern = Some("[0-9]+".to_string());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_record_serde_shape() {
        let mut record = AttributeRecord::new("email", SimpleAttrType::String);
        record.required = Some(true);
        record.unique = Some(true);
        record.pattern = Some("@".to_string());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], json!("email"));
        assert_eq!(value["type"], json!("string"));
        assert_eq!(value["match"], json!("@"));
        assert!(value.get("nestedAttributes").is_none());
        assert!(is_object_id(value["_id"].as_str().unwrap()));
    }

    #[test]
    fn test_def_document_serde() {
        let def = EntityDef {
            namespace: Some("sys".to_string()),
            name: "Test".to_string(),
            label: None,
            description: None,
            prompts: None,
            entity_schema: None,
            attributes: vec![AttributeRecord::new("name", SimpleAttrType::String)],
            methods: None,
            parent: None,
            object_title: None,
            abc: None,
            dlg_form: None,
            view_form: None,
            system_fields: None,
        };
        let doc = EntityDefDocument::new("65f0123456789abcdef01234", def);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], json!("65f0123456789abcdef01234"));
        assert_eq!(json["name"], json!("Test"));

        let back: EntityDefDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_def_validation_wraps_context() {
        let mut record = AttributeRecord::new("state", SimpleAttrType::Enum);
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

        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("Test.state"));
        assert!(err.to_string().contains("empty enum array"));
    }

    #[test]
    fn test_system_fields_loose_decoding() {
        let json = json!({
            "_id": "65f0123456789abcdef01234",
            "name": "Test",
            "attributes": [],
            "systemFields": { "createdBy": true, "bogus": 1 }
        });

        let doc: EntityDefDocument = serde_json::from_value(json).unwrap();
        let sf = doc.def.system_fields.unwrap();
        assert!(sf.is_enabled(ermeta_core::SystemFieldName::CreatedBy));

        // a wholly unrecognizable shape decodes as absent
        let json = json!({
            "_id": "65f0123456789abcdef01234",
            "name": "Test",
            "attributes": [],
            "systemFields": "everything"
        });
        let doc: EntityDefDocument = serde_json::from_value(json).unwrap();
        assert!(doc.def.system_fields.is_none());
    }
}
