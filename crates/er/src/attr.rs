//! The attribute-type algebra
//!
//! This module contains `AttrType`, the recursive tagged union at the heart
//! of the metadata engine, together with its classification predicates and
//! the ordered `EntityAttributes` map. Wire-shape discrimination (a value
//! may arrive as a bare tag string, a descriptive object, a nested map, an
//! embedded entity, or an array shorthand) happens once, in the serde
//! implementations at the edge; everything downstream operates on the typed
//! union only.

use crate::entity::Entity;
use ermeta_core::{
    DisplayedField, MetaError, MetaResult, OfTag, SimpleAttrType, deserialize_explicit_value,
};
use serde::de::{Deserializer, Error as DeError, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// AttrType
// ============================================================================

/// The type of a single entity attribute
///
/// Exactly one variant classifies any given value; the predicates below are
/// mutually exclusive and jointly exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    /// A bare simple type tag (`"string"`, `"number"`, ...)
    Simple(SimpleAttrType),

    /// A descriptive type definition carrying constraints and metadata
    Def(Box<AttrTypeDef>),

    /// A nested object of attributes
    Nested(EntityAttributes),

    /// An embedded sub-entity
    Schema(EntitySchema),

    /// Array-of-single-type shorthand; exactly one element is valid
    Array(Vec<AttrType>),
}

impl AttrType {
    /// Create the array-of shorthand around an element type
    pub fn array_of(element: impl Into<AttrType>) -> AttrType {
        AttrType::Array(vec![element.into()])
    }

    /// Check if this is a bare simple type tag
    pub fn is_simple(&self) -> bool {
        matches!(self, AttrType::Simple(_))
    }

    /// Check if this is a descriptive type definition
    pub fn is_def(&self) -> bool {
        matches!(self, AttrType::Def(_))
    }

    /// Check if this is a nested attribute map
    pub fn is_nested(&self) -> bool {
        matches!(self, AttrType::Nested(_))
    }

    /// Check if this is an embedded sub-entity
    pub fn is_schema(&self) -> bool {
        matches!(self, AttrType::Schema(_))
    }

    /// Check if this is the array shorthand
    pub fn is_array(&self) -> bool {
        matches!(self, AttrType::Array(_))
    }

    /// Get the definition payload, if this is a `Def`
    pub fn as_def(&self) -> Option<&AttrTypeDef> {
        match self {
            AttrType::Def(def) => Some(def),
            _ => None,
        }
    }

    /// Get the nested attribute map, if this is a `Nested`
    pub fn as_nested(&self) -> Option<&EntityAttributes> {
        match self {
            AttrType::Nested(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Get the simple tag this value reduces to, if any
    ///
    /// A bare tag resolves to itself; a definition resolves to its declared
    /// tag when that tag is simple. Nested maps, embedded entities and
    /// array shorthands have no single tag.
    pub fn simple_tag(&self) -> Option<SimpleAttrType> {
        match self {
            AttrType::Simple(t) => Some(*t),
            AttrType::Def(def) => match def.attr_type {
                AttrType::Simple(t) => Some(t),
                _ => None,
            },
            _ => None,
        }
    }

    /// Check if this attribute is string-typed
    pub fn is_string_attr(&self) -> bool {
        self.simple_tag() == Some(SimpleAttrType::String)
    }

    /// Check if this attribute is number-typed
    pub fn is_number_attr(&self) -> bool {
        self.simple_tag() == Some(SimpleAttrType::Number)
    }

    /// Check if this attribute is boolean-typed
    pub fn is_boolean_attr(&self) -> bool {
        self.simple_tag() == Some(SimpleAttrType::Boolean)
    }

    /// Check if this attribute is timestamp-typed
    pub fn is_timestamp_attr(&self) -> bool {
        self.simple_tag() == Some(SimpleAttrType::Timestamp)
    }

    /// Check if this attribute is date-typed
    pub fn is_date_attr(&self) -> bool {
        self.simple_tag() == Some(SimpleAttrType::Date)
    }

    /// Check if this attribute is time-typed
    pub fn is_time_attr(&self) -> bool {
        self.simple_tag() == Some(SimpleAttrType::Time)
    }

    /// Resolve the underlying simple type and arrayness of this value
    ///
    /// An embedded entity resolves to an array of `entity`; an array
    /// shorthand (or a definition whose declared type is one) resolves to
    /// its element's tag with `is_array` set. Nested maps do not resolve.
    pub fn resolved_type(&self) -> Option<ResolvedAttrType> {
        match self {
            AttrType::Simple(t) => Some(ResolvedAttrType {
                simple_type: *t,
                is_array: false,
            }),
            AttrType::Def(def) => def.attr_type.resolved_type(),
            AttrType::Schema(_) => Some(ResolvedAttrType {
                simple_type: SimpleAttrType::Entity,
                is_array: true,
            }),
            AttrType::Array(elements) => {
                let inner = elements.first()?.resolved_type()?;
                Some(ResolvedAttrType {
                    simple_type: inner.simple_type,
                    is_array: true,
                })
            }
            AttrType::Nested(_) => None,
        }
    }

    /// Classify a raw JSON value into the typed union
    pub fn classify(value: Value) -> MetaResult<AttrType> {
        classify_value(value).map_err(MetaError::validation)
    }
}

impl From<SimpleAttrType> for AttrType {
    fn from(t: SimpleAttrType) -> Self {
        AttrType::Simple(t)
    }
}

impl From<AttrTypeDef> for AttrType {
    fn from(def: AttrTypeDef) -> Self {
        AttrType::Def(Box::new(def))
    }
}

impl From<EntityAttributes> for AttrType {
    fn from(attrs: EntityAttributes) -> Self {
        AttrType::Nested(attrs)
    }
}

impl From<EntitySchema> for AttrType {
    fn from(schema: EntitySchema) -> Self {
        AttrType::Schema(schema)
    }
}

fn classify_value(value: Value) -> Result<AttrType, String> {
    match value {
        Value::String(tag) => SimpleAttrType::parse(&tag)
            .map(AttrType::Simple)
            .ok_or_else(|| format!("unknown attribute type '{}'", tag)),
        Value::Array(items) => items
            .into_iter()
            .map(classify_value)
            .collect::<Result<Vec<_>, _>>()
            .map(AttrType::Array),
        Value::Object(ref map) => {
            if map.contains_key("entity") {
                serde_json::from_value::<EntitySchema>(value)
                    .map(AttrType::Schema)
                    .map_err(|e| e.to_string())
            } else if matches!(
                map.get("type"),
                Some(Value::String(_)) | Some(Value::Array(_))
            ) {
                // a definition declares its type as a tag or an array
                // shorthand; a nested map may contain a key literally named
                // `type` whose value is itself an attribute object
                serde_json::from_value::<AttrTypeDef>(value)
                    .map(|def| AttrType::Def(Box::new(def)))
                    .map_err(|e| e.to_string())
            } else {
                serde_json::from_value::<EntityAttributes>(value)
                    .map(AttrType::Nested)
                    .map_err(|e| e.to_string())
            }
        }
        other => Err(format!("invalid attribute type shape: {}", other)),
    }
}

impl Serialize for AttrType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AttrType::Simple(t) => t.serialize(serializer),
            AttrType::Def(def) => def.serialize(serializer),
            AttrType::Nested(attrs) => attrs.serialize(serializer),
            AttrType::Schema(schema) => schema.serialize(serializer),
            AttrType::Array(elements) => elements.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AttrType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        classify_value(value).map_err(D::Error::custom)
    }
}

/// The simple type and arrayness an attribute value resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAttrType {
    pub simple_type: SimpleAttrType,
    pub is_array: bool,
}

// ============================================================================
// AttrTypeDef
// ============================================================================

/// A fully descriptive attribute definition
///
/// `attr_type` may itself be any `AttrType`, enabling arbitrary nesting;
/// in practice it is a simple tag or the `[nestedAttrs]` array shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttrTypeDef {
    /// The declared type
    #[serde(rename = "type")]
    pub attr_type: AttrType,

    /// Whether a value is mandatory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Whether an explicit null is a legal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    /// Declared default value, kept raw until normalized
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_explicit_value"
    )]
    pub default: Option<Value>,

    /// Allowed values; must be non-empty when present
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

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

    /// Full name of the entity a reference attribute points at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_entity: Option<String>,

    /// Element type of an array attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub of: Option<OfType>,

    /// Fields of the referenced entity to surface when rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_fields: Option<Vec<DisplayedField>>,

    /// Label for use in the user interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Detailed description of the attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Placeholder text for input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Tooltip text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// Framework-managed attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,

    /// Read-only in forms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,

    /// Hidden from default views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl AttrTypeDef {
    /// Create a definition for the given simple type
    pub fn of_type(t: SimpleAttrType) -> Self {
        Self {
            attr_type: AttrType::Simple(t),
            ..Default::default()
        }
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Mark the attribute as required
    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    /// Mark the attribute as unique
    pub fn unique(mut self) -> Self {
        self.unique = Some(true);
        self
    }

    /// Mark the attribute as indexed
    pub fn indexed(mut self) -> Self {
        self.index = Some(true);
        self
    }

    /// Mark the attribute as nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    /// Enable whitespace trimming
    pub fn trimmed(mut self) -> Self {
        self.trim = Some(true);
        self
    }

    /// Set the default value
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the allowed value set
    pub fn with_enum<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Set the match pattern
    pub fn with_match(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the length bounds
    pub fn with_length(mut self, min: u32, max: u32) -> Self {
        self.minlength = Some(min);
        self.maxlength = Some(max);
        self
    }

    /// Set the referenced entity
    pub fn references(mut self, entity: impl Into<String>) -> Self {
        self.references_entity = Some(entity.into());
        self
    }

    /// Set the displayed fields of the referenced entity
    pub fn with_displayed_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = DisplayedField>,
    {
        self.displayed_fields = Some(fields.into_iter().collect());
        self
    }

    /// Set the element type of an array attribute
    pub fn with_of(mut self, of: impl Into<OfType>) -> Self {
        self.of = Some(of.into());
        self
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mark the attribute as read-only
    pub fn readonly(mut self) -> Self {
        self.readonly = Some(true);
        self
    }

    /// Mark the attribute as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = Some(true);
        self
    }

    // ========================================================================
    // Compaction
    // ========================================================================

    /// Check if this definition carries nothing beyond a bare simple tag
    pub fn is_bare_type(&self) -> bool {
        matches!(self.attr_type, AttrType::Simple(_))
            && self.required.is_none()
            && self.nullable.is_none()
            && self.default.is_none()
            && self.enum_values.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && self.minlength.is_none()
            && self.maxlength.is_none()
            && self.trim.is_none()
            && self.lowercase.is_none()
            && self.uppercase.is_none()
            && self.pattern.is_none()
            && self.index.is_none()
            && self.unique.is_none()
            && self.sparse.is_none()
            && self.references_entity.is_none()
            && self.of.is_none()
            && self.displayed_fields.is_none()
            && self.label.is_none()
            && self.description.is_none()
            && self.placeholder.is_none()
            && self.tooltip.is_none()
            && self.system.is_none()
            && self.readonly.is_none()
            && self.hidden.is_none()
    }

    /// Collapse this definition to the bare-tag shorthand when possible
    pub fn collapse(self) -> AttrType {
        if self.is_bare_type() {
            match self.attr_type {
                AttrType::Simple(t) => AttrType::Simple(t),
                other => AttrType::Def(Box::new(AttrTypeDef {
                    attr_type: other,
                    ..Default::default()
                })),
            }
        } else {
            AttrType::Def(Box::new(self))
        }
    }
}

impl Default for AttrTypeDef {
    fn default() -> Self {
        Self {
            attr_type: AttrType::Simple(SimpleAttrType::String),
            required: None,
            nullable: None,
            default: None,
            enum_values: None,
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
            of: None,
            displayed_fields: None,
            label: None,
            description: None,
            placeholder: None,
            tooltip: None,
            system: None,
            readonly: None,
            hidden: None,
        }
    }
}

// ============================================================================
// OfType
// ============================================================================

/// The element type of an array attribute
///
/// Either a simple element tag (`of: "string"`, `of: "objectid"`) or a
/// nested attribute map (`of: { role: ..., content: ... }`).
#[derive(Debug, Clone, PartialEq)]
pub enum OfType {
    /// A simple element tag
    Tag(OfTag),
    /// A nested attribute map describing array-of-objects
    Nested(EntityAttributes),
}

impl OfType {
    /// Get the element tag, if this is a simple element type
    pub fn as_tag(&self) -> Option<OfTag> {
        match self {
            OfType::Tag(tag) => Some(*tag),
            OfType::Nested(_) => None,
        }
    }

    /// Get the nested map, if this describes array-of-objects
    pub fn as_nested(&self) -> Option<&EntityAttributes> {
        match self {
            OfType::Tag(_) => None,
            OfType::Nested(attrs) => Some(attrs),
        }
    }
}

impl From<OfTag> for OfType {
    fn from(tag: OfTag) -> Self {
        OfType::Tag(tag)
    }
}

impl From<EntityAttributes> for OfType {
    fn from(attrs: EntityAttributes) -> Self {
        OfType::Nested(attrs)
    }
}

impl Serialize for OfType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            OfType::Tag(tag) => tag.serialize(serializer),
            OfType::Nested(attrs) => attrs.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OfType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(tag) => OfTag::parse(&tag)
                .map(OfType::Tag)
                .ok_or_else(|| D::Error::custom(format!("unknown element type '{}'", tag))),
            Value::Object(_) => serde_json::from_value::<EntityAttributes>(value)
                .map(OfType::Nested)
                .map_err(D::Error::custom),
            other => Err(D::Error::custom(format!(
                "invalid element type shape: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// EntityAttributes
// ============================================================================

/// An ordered mapping from attribute name to type
///
/// Keys are unique; insertion order is preserved and semantically
/// meaningful (it becomes display order and the order of stored attribute
/// records).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityAttributes {
    entries: Vec<(String, AttrType)>,
}

impl EntityAttributes {
    /// Create an empty attribute map
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace an attribute, preserving an existing key's position
    pub fn insert(&mut self, name: impl Into<String>, attr: impl Into<AttrType>) {
        let name = name.into();
        let attr = attr.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = attr;
        } else {
            self.entries.push((name, attr));
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, attr: impl Into<AttrType>) -> Self {
        self.insert(name, attr);
        self
    }

    /// Look up an attribute by name
    pub fn get(&self, name: &str) -> Option<&AttrType> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, attr)| attr)
    }

    /// Check if an attribute name is present
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Remove an attribute by name
    pub fn remove(&mut self, name: &str) -> Option<AttrType> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate over `(name, type)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrType)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Iterate over attribute names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, A: Into<AttrType>> FromIterator<(N, A)> for EntityAttributes {
    fn from_iter<I: IntoIterator<Item = (N, A)>>(iter: I) -> Self {
        let mut attrs = EntityAttributes::new();
        for (name, attr) in iter {
            attrs.insert(name, attr);
        }
        attrs
    }
}

impl Serialize for EntityAttributes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, attr) in &self.entries {
            map.serialize_entry(name, attr)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EntityAttributes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AttrsVisitor;

        impl<'de> Visitor<'de> for AttrsVisitor {
            type Value = EntityAttributes;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of attribute name to attribute type")
            }

            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut attrs = EntityAttributes::new();
                while let Some((name, attr)) = access.next_entry::<String, AttrType>()? {
                    attrs.insert(name, attr);
                }
                Ok(attrs)
            }
        }

        deserializer.deserialize_map(AttrsVisitor)
    }
}

// ============================================================================
// EntitySchema
// ============================================================================

/// An embedded sub-entity used as an attribute type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// The embedded entity
    pub entity: Box<Entity>,

    /// Sub-schema options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<SchemaOptions>,
}

/// Options of an embedded sub-schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// Whether the sub-documents carry their own identity field
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<bool>,

    /// Collection name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

// ============================================================================
// Attribute validation
// ============================================================================

/// Validate one attribute value against the shape invariants
///
/// Enforced as hard errors: non-empty `enum`/`displayedFields` lists,
/// `match` only on string attributes, mandatory `referencesEntity` for
/// reference types (directly or through an array's element type),
/// mandatory `displayedFields` alongside `referencesEntity`, element types
/// for arrays, and single-element array shorthands.
pub fn validate_attr_type(entity_name: &str, attr_name: &str, attr: &AttrType) -> MetaResult<()> {
    let fail = |message: &str| {
        Err(MetaError::attribute_validation(
            entity_name,
            attr_name,
            message,
        ))
    };

    match attr {
        AttrType::Simple(SimpleAttrType::Enum) => {
            fail("'enum' attributes require a non-empty enum list")
        }
        AttrType::Simple(SimpleAttrType::Array) => {
            fail("'array' attributes must declare an element type")
        }
        AttrType::Simple(_) => Ok(()),

        AttrType::Def(def) => validate_attr_def(entity_name, attr_name, def),

        AttrType::Nested(attrs) => {
            for (name, nested) in attrs.iter() {
                validate_attr_type(entity_name, name, nested)?;
            }
            Ok(())
        }

        AttrType::Schema(schema) => {
            use ermeta_core::Validatable;
            schema.entity.validate()
        }

        AttrType::Array(elements) => {
            if elements.len() != 1 {
                return fail("array type should have only one element");
            }
            validate_attr_type(entity_name, attr_name, &elements[0])
        }
    }
}

fn validate_attr_def(entity_name: &str, attr_name: &str, def: &AttrTypeDef) -> MetaResult<()> {
    let fail = |message: String| {
        Err(MetaError::attribute_validation(
            entity_name,
            attr_name,
            message,
        ))
    };

    if let Some(values) = &def.enum_values {
        if values.is_empty() {
            return fail("empty enum array".to_string());
        }
    }

    if let Some(fields) = &def.displayed_fields {
        if fields.is_empty() {
            return fail("empty displayedFields array".to_string());
        }
        for field in fields {
            if field.field.is_empty() {
                return fail("displayedFields entries require a field name".to_string());
            }
        }
    }

    let tag = def.attr_type.simple_tag();

    if def.pattern.is_some() && tag != Some(SimpleAttrType::String) {
        return fail("'match' can only be used with type 'string'".to_string());
    }

    if tag == Some(SimpleAttrType::Enum) && def.enum_values.is_none() {
        return fail("'enum' is required when type is 'enum'".to_string());
    }

    let references_element = def.of.as_ref().and_then(OfType::as_tag).is_some_and(|t| t.is_reference());
    let is_reference = tag.is_some_and(|t| t.is_reference())
        || (tag == Some(SimpleAttrType::Array) && references_element);

    if is_reference && def.references_entity.is_none() {
        return fail(
            "'referencesEntity' is required when type is 'objectid' or 'entity'".to_string(),
        );
    }

    if def.references_entity.is_some() && def.displayed_fields.is_none() {
        return fail("'displayedFields' is required when 'referencesEntity' is present".to_string());
    }

    match &def.attr_type {
        AttrType::Simple(SimpleAttrType::Array) => {
            match &def.of {
                None => fail("'of' is required when type is 'array'".to_string()),
                Some(OfType::Nested(attrs)) => {
                    for (name, nested) in attrs.iter() {
                        validate_attr_type(entity_name, name, nested)?;
                    }
                    Ok(())
                }
                Some(OfType::Tag(_)) => Ok(()),
            }
        }
        AttrType::Simple(_) => Ok(()),
        // the array shorthand and nested forms validate recursively
        other => validate_attr_type(entity_name, attr_name, other),
    }
}

// ============================================================================
// Tests
// ============================================================================
