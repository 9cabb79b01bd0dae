//! Core types used throughout Ermeta
//!
//! This module contains the scalar vocabulary of the metadata engine: the
//! fixed attribute-type tag set, method types and environments, system-field
//! configuration, and the small wire-level helper types shared by the
//! in-memory and persisted representations.

use serde::de::{Deserializer, Error as DeError};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// SimpleAttrType
// ============================================================================

/// The fixed set of simple attribute type tags
///
/// A bare tag is the shorthand form of an attribute declaration; every
/// descriptive definition ultimately resolves to one of these tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimpleAttrType {
    Array,
    ObjectId,
    Boolean,
    Number,
    String,
    Timestamp,
    Date,
    Time,
    Entity,
    Enum,
    Map,
    Buffer,
}

impl SimpleAttrType {
    /// Get the lowercase tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            SimpleAttrType::Array => "array",
            SimpleAttrType::ObjectId => "objectid",
            SimpleAttrType::Boolean => "boolean",
            SimpleAttrType::Number => "number",
            SimpleAttrType::String => "string",
            SimpleAttrType::Timestamp => "timestamp",
            SimpleAttrType::Date => "date",
            SimpleAttrType::Time => "time",
            SimpleAttrType::Entity => "entity",
            SimpleAttrType::Enum => "enum",
            SimpleAttrType::Map => "map",
            SimpleAttrType::Buffer => "buffer",
        }
    }

    /// Parse a tag string into a simple type, if it matches the fixed set
    pub fn parse(s: &str) -> Option<SimpleAttrType> {
        match s {
            "array" => Some(SimpleAttrType::Array),
            "objectid" => Some(SimpleAttrType::ObjectId),
            "boolean" => Some(SimpleAttrType::Boolean),
            "number" => Some(SimpleAttrType::Number),
            "string" => Some(SimpleAttrType::String),
            "timestamp" => Some(SimpleAttrType::Timestamp),
            "date" => Some(SimpleAttrType::Date),
            "time" => Some(SimpleAttrType::Time),
            "entity" => Some(SimpleAttrType::Entity),
            "enum" => Some(SimpleAttrType::Enum),
            "map" => Some(SimpleAttrType::Map),
            "buffer" => Some(SimpleAttrType::Buffer),
            _ => None,
        }
    }

    /// Check if this tag denotes a point in time
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            SimpleAttrType::Timestamp | SimpleAttrType::Date | SimpleAttrType::Time
        )
    }

    /// Check if this tag denotes a reference to another entity's record
    pub fn is_reference(&self) -> bool {
        matches!(self, SimpleAttrType::ObjectId | SimpleAttrType::Entity)
    }

    /// Get all simple attribute types
    pub fn all() -> &'static [SimpleAttrType] {
        &[
            SimpleAttrType::Array,
            SimpleAttrType::ObjectId,
            SimpleAttrType::Boolean,
            SimpleAttrType::Number,
            SimpleAttrType::String,
            SimpleAttrType::Timestamp,
            SimpleAttrType::Date,
            SimpleAttrType::Time,
            SimpleAttrType::Entity,
            SimpleAttrType::Enum,
            SimpleAttrType::Map,
            SimpleAttrType::Buffer,
        ]
    }
}

impl std::str::FromStr for SimpleAttrType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SimpleAttrType::parse(s).ok_or_else(|| format!("unknown attribute type '{}'", s))
    }
}

impl std::fmt::Display for SimpleAttrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// OfTag
// ============================================================================

/// Element-type tags permitted in the stored `of` field of array attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfTag {
    String,
    Number,
    Boolean,
    Timestamp,
    ObjectId,
    Entity,
    Object,
}

impl OfTag {
    /// Get the lowercase tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            OfTag::String => "string",
            OfTag::Number => "number",
            OfTag::Boolean => "boolean",
            OfTag::Timestamp => "timestamp",
            OfTag::ObjectId => "objectid",
            OfTag::Entity => "entity",
            OfTag::Object => "object",
        }
    }

    /// Parse a tag string
    pub fn parse(s: &str) -> Option<OfTag> {
        match s {
            "string" => Some(OfTag::String),
            "number" => Some(OfTag::Number),
            "boolean" => Some(OfTag::Boolean),
            "timestamp" => Some(OfTag::Timestamp),
            "objectid" => Some(OfTag::ObjectId),
            "entity" => Some(OfTag::Entity),
            "object" => Some(OfTag::Object),
            _ => None,
        }
    }

    /// Convert a simple attribute type to an element tag, if representable
    pub fn from_simple(t: SimpleAttrType) -> Option<OfTag> {
        match t {
            SimpleAttrType::String => Some(OfTag::String),
            SimpleAttrType::Number => Some(OfTag::Number),
            SimpleAttrType::Boolean => Some(OfTag::Boolean),
            SimpleAttrType::Timestamp => Some(OfTag::Timestamp),
            SimpleAttrType::ObjectId => Some(OfTag::ObjectId),
            SimpleAttrType::Entity => Some(OfTag::Entity),
            _ => None,
        }
    }

    /// Resolve the element tag back to a simple attribute type
    ///
    /// `object` has no simple counterpart and resolves to `None`.
    pub fn to_simple(&self) -> Option<SimpleAttrType> {
        match self {
            OfTag::String => Some(SimpleAttrType::String),
            OfTag::Number => Some(SimpleAttrType::Number),
            OfTag::Boolean => Some(SimpleAttrType::Boolean),
            OfTag::Timestamp => Some(SimpleAttrType::Timestamp),
            OfTag::ObjectId => Some(SimpleAttrType::ObjectId),
            OfTag::Entity => Some(SimpleAttrType::Entity),
            OfTag::Object => None,
        }
    }

    /// Check if this tag denotes a reference element
    pub fn is_reference(&self) -> bool {
        matches!(self, OfTag::ObjectId | OfTag::Entity)
    }
}

impl std::fmt::Display for OfTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MethodType
// ============================================================================

/// Lifecycle hook slots an entity method can be attached to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum MethodType {
    BeforePost,
    AfterPost,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeSubmit,
    AfterSubmit,
    BeforeFormOpen,
    AfterFormOpen,
}

/// Method types executed on the server
pub const SERVER_METHOD_TYPES: [MethodType; 6] = [
    MethodType::BeforePost,
    MethodType::AfterPost,
    MethodType::BeforeUpdate,
    MethodType::AfterUpdate,
    MethodType::BeforeDelete,
    MethodType::AfterDelete,
];

/// Method types executed on the client
pub const CLIENT_METHOD_TYPES: [MethodType; 4] = [
    MethodType::BeforeSubmit,
    MethodType::AfterSubmit,
    MethodType::BeforeFormOpen,
    MethodType::AfterFormOpen,
];

/// All method types
pub const METHOD_TYPES: [MethodType; 10] = [
    MethodType::BeforePost,
    MethodType::AfterPost,
    MethodType::BeforeUpdate,
    MethodType::AfterUpdate,
    MethodType::BeforeDelete,
    MethodType::AfterDelete,
    MethodType::BeforeSubmit,
    MethodType::AfterSubmit,
    MethodType::BeforeFormOpen,
    MethodType::AfterFormOpen,
];

impl MethodType {
    /// Get the camelCase tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodType::BeforePost => "beforePost",
            MethodType::AfterPost => "afterPost",
            MethodType::BeforeUpdate => "beforeUpdate",
            MethodType::AfterUpdate => "afterUpdate",
            MethodType::BeforeDelete => "beforeDelete",
            MethodType::AfterDelete => "afterDelete",
            MethodType::BeforeSubmit => "beforeSubmit",
            MethodType::AfterSubmit => "afterSubmit",
            MethodType::BeforeFormOpen => "beforeFormOpen",
            MethodType::AfterFormOpen => "afterFormOpen",
        }
    }

    /// Check if this hook runs on the server
    pub fn is_server(&self) -> bool {
        SERVER_METHOD_TYPES.contains(self)
    }

    /// Check if this hook runs on the client
    pub fn is_client(&self) -> bool {
        CLIENT_METHOD_TYPES.contains(self)
    }
}

impl std::fmt::Display for MethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MethodEnvironment
// ============================================================================

/// Execution environment of a method
///
/// The stored form is two-valued. The legacy tag `both` is still accepted
/// on deserialization and normalized to `server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodEnvironment {
    Server,
    Client,
}

impl MethodEnvironment {
    /// Get the lowercase tag string
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodEnvironment::Server => "server",
            MethodEnvironment::Client => "client",
        }
    }
}

impl<'de> Deserialize<'de> for MethodEnvironment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        match tag.as_str() {
            "server" | "both" => Ok(MethodEnvironment::Server),
            "client" => Ok(MethodEnvironment::Client),
            other => Err(D::Error::custom(format!(
                "unknown method environment '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for MethodEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// System Fields
// ============================================================================

/// Names of the implicit, framework-managed fields
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum SystemFieldName {
    CreatedBy,
    CreatedAt,
    UpdatedBy,
    UpdatedAt,
}

/// All system field names
pub const ALL_SYSTEM_FIELD_NAMES: [SystemFieldName; 4] = [
    SystemFieldName::CreatedBy,
    SystemFieldName::CreatedAt,
    SystemFieldName::UpdatedBy,
    SystemFieldName::UpdatedAt,
];

impl SystemFieldName {
    /// Get the camelCase field name
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemFieldName::CreatedBy => "createdBy",
            SystemFieldName::CreatedAt => "createdAt",
            SystemFieldName::UpdatedBy => "updatedBy",
            SystemFieldName::UpdatedAt => "updatedAt",
        }
    }

    /// Parse a field name
    pub fn parse(s: &str) -> Option<SystemFieldName> {
        match s {
            "createdBy" => Some(SystemFieldName::CreatedBy),
            "createdAt" => Some(SystemFieldName::CreatedAt),
            "updatedBy" => Some(SystemFieldName::UpdatedBy),
            "updatedAt" => Some(SystemFieldName::UpdatedAt),
            _ => None,
        }
    }
}

impl std::fmt::Display for SystemFieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-entity configuration of the implicit system fields
///
/// Either an all-or-nothing boolean, or a partial map of field name to
/// enabled flag. A field missing from the map counts as disabled.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemFields {
    /// All system fields on or off
    All(bool),
    /// Individual toggles per field
    Selective(BTreeMap<SystemFieldName, bool>),
}

impl SystemFields {
    /// Check whether a specific system field is enabled
    pub fn is_enabled(&self, name: SystemFieldName) -> bool {
        match self {
            SystemFields::All(enabled) => *enabled,
            SystemFields::Selective(map) => map.get(&name).copied().unwrap_or(false),
        }
    }

    /// Check whether a specific system field is explicitly disabled
    pub fn is_disabled(&self, name: SystemFieldName) -> bool {
        match self {
            SystemFields::All(enabled) => !*enabled,
            SystemFields::Selective(map) => map.get(&name).copied() == Some(false),
        }
    }

    /// Normalize a loose wire value into a system-fields configuration
    ///
    /// Accepts a boolean or an object whose entries are field-name/boolean
    /// pairs. Unrecognized keys and non-boolean values are discarded; if
    /// nothing recognizable remains, the result is `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<SystemFields> {
        match value {
            serde_json::Value::Bool(b) => Some(SystemFields::All(*b)),
            serde_json::Value::Object(entries) => {
                let mut config = BTreeMap::new();
                for (key, raw) in entries {
                    let (Some(name), Some(enabled)) =
                        (SystemFieldName::parse(key), raw.as_bool())
                    else {
                        continue;
                    };
                    config.insert(name, enabled);
                }
                if config.is_empty() {
                    None
                } else {
                    Some(SystemFields::Selective(config))
                }
            }
            _ => None,
        }
    }
}

impl From<bool> for SystemFields {
    fn from(enabled: bool) -> Self {
        SystemFields::All(enabled)
    }
}

impl Serialize for SystemFields {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SystemFields::All(enabled) => serializer.serialize_bool(*enabled),
            SystemFields::Selective(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (name, enabled) in map {
                    out.serialize_entry(name.as_str(), enabled)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for SystemFields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        SystemFields::from_value(&value)
            .ok_or_else(|| D::Error::custom("unrecognized system fields configuration"))
    }
}

/// Deserialize an optional system-fields configuration, treating an
/// unrecognized shape as absent rather than an error
pub fn deserialize_system_fields<'de, D>(
    deserializer: D,
) -> Result<Option<SystemFields>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(SystemFields::from_value(&value))
}

// ============================================================================
// DisplayedField
// ============================================================================

/// A field of a referenced entity surfaced when rendering a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedField {
    /// Name of the field in the referenced entity
    pub field: String,

    /// Whether the field is read-only in the referencing form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,

    /// Whether the field is hidden from default views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl DisplayedField {
    /// Create a displayed field for the given field name
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            readonly: None,
            hidden: None,
        }
    }

    /// Mark the field as read-only
    pub fn readonly(mut self) -> Self {
        self.readonly = Some(true);
        self
    }

    /// Mark the field as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = Some(true);
        self
    }
}

// ============================================================================
// ObjectTitle
// ============================================================================

/// Object title template of an entity
///
/// Either a single attribute reference (`"$name"`) or a list of parts
/// concatenated when rendering record titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectTitle {
    /// A single attribute reference
    Single(String),
    /// Parts joined by string concatenation
    Concat(Vec<String>),
}

impl From<&str> for ObjectTitle {
    fn from(s: &str) -> Self {
        ObjectTitle::Single(s.to_string())
    }
}

impl From<String> for ObjectTitle {
    fn from(s: String) -> Self {
        ObjectTitle::Single(s)
    }
}

impl From<Vec<String>> for ObjectTitle {
    fn from(parts: Vec<String>) -> Self {
        ObjectTitle::Concat(parts)
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// Deserialize an optional JSON value, keeping an explicit `null` distinct
/// from an absent key
///
/// Declared defaults may legitimately be `null`; with the plain
/// `Option<Value>` behavior a present-but-null key would collapse to
/// `None` and be lost on the next write.
pub fn deserialize_explicit_value<'de, D>(
    deserializer: D,
) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_attr_type_parse() {
        assert_eq!(SimpleAttrType::parse("string"), Some(SimpleAttrType::String));
        assert_eq!(
            SimpleAttrType::parse("objectid"),
            Some(SimpleAttrType::ObjectId)
        );
        assert_eq!(SimpleAttrType::parse("buffer"), Some(SimpleAttrType::Buffer));
        assert_eq!(SimpleAttrType::parse("integer"), None);
        assert_eq!(SimpleAttrType::parse(""), None);
    }

    #[test]
    fn test_simple_attr_type_round_trip() {
        for t in SimpleAttrType::all() {
            assert_eq!(SimpleAttrType::parse(t.as_str()), Some(*t));
        }
    }

    #[test]
    fn test_simple_attr_type_serde() {
        let json = serde_json::to_string(&SimpleAttrType::ObjectId).unwrap();
        assert_eq!(json, "\"objectid\"");

        let back: SimpleAttrType = serde_json::from_str("\"timestamp\"").unwrap();
        assert_eq!(back, SimpleAttrType::Timestamp);
    }

    #[test]
    fn test_simple_attr_type_classes() {
        assert!(SimpleAttrType::Timestamp.is_temporal());
        assert!(SimpleAttrType::Date.is_temporal());
        assert!(!SimpleAttrType::String.is_temporal());
        assert!(SimpleAttrType::ObjectId.is_reference());
        assert!(SimpleAttrType::Entity.is_reference());
        assert!(!SimpleAttrType::Map.is_reference());
    }

    #[test]
    fn test_of_tag() {
        assert_eq!(OfTag::parse("objectid"), Some(OfTag::ObjectId));
        assert_eq!(OfTag::parse("object"), Some(OfTag::Object));
        assert_eq!(OfTag::parse("buffer"), None);

        assert_eq!(
            OfTag::from_simple(SimpleAttrType::String),
            Some(OfTag::String)
        );
        assert_eq!(OfTag::from_simple(SimpleAttrType::Map), None);

        assert_eq!(OfTag::ObjectId.to_simple(), Some(SimpleAttrType::ObjectId));
        assert_eq!(OfTag::Object.to_simple(), None);
        assert!(OfTag::ObjectId.is_reference());
    }

    #[test]
    fn test_method_type_partition() {
        assert!(MethodType::BeforePost.is_server());
        assert!(!MethodType::BeforePost.is_client());
        assert!(MethodType::AfterSubmit.is_client());

        assert_eq!(
            SERVER_METHOD_TYPES.len() + CLIENT_METHOD_TYPES.len(),
            METHOD_TYPES.len()
        );
    }

    #[test]
    fn test_method_type_serde() {
        let json = serde_json::to_string(&MethodType::BeforeFormOpen).unwrap();
        assert_eq!(json, "\"beforeFormOpen\"");
    }

    #[test]
    fn test_method_environment() {
        let server: MethodEnvironment = serde_json::from_str("\"server\"").unwrap();
        assert_eq!(server, MethodEnvironment::Server);

        let client: MethodEnvironment = serde_json::from_str("\"client\"").unwrap();
        assert_eq!(client, MethodEnvironment::Client);

        // legacy three-valued tag normalizes to server
        let both: MethodEnvironment = serde_json::from_str("\"both\"").unwrap();
        assert_eq!(both, MethodEnvironment::Server);

        assert!(serde_json::from_str::<MethodEnvironment>("\"edge\"").is_err());
    }

    #[test]
    fn test_system_fields_from_bool() {
        assert_eq!(
            SystemFields::from_value(&json!(true)),
            Some(SystemFields::All(true))
        );
        assert_eq!(
            SystemFields::from_value(&json!(false)),
            Some(SystemFields::All(false))
        );
    }

    #[test]
    fn test_system_fields_from_object() {
        let config = SystemFields::from_value(&json!({
            "createdBy": true,
            "updatedAt": false,
            "invalidKey": true,
            "createdAt": "yes"
        }))
        .unwrap();

        assert!(config.is_enabled(SystemFieldName::CreatedBy));
        assert!(!config.is_enabled(SystemFieldName::UpdatedAt));
        assert!(config.is_disabled(SystemFieldName::UpdatedAt));
        // non-boolean value discarded, so the field counts as unset
        assert!(!config.is_enabled(SystemFieldName::CreatedAt));
        assert!(!config.is_disabled(SystemFieldName::CreatedAt));
    }

    #[test]
    fn test_system_fields_unrecognized() {
        assert_eq!(SystemFields::from_value(&json!("all")), None);
        assert_eq!(SystemFields::from_value(&json!({ "bogus": true })), None);
        assert_eq!(SystemFields::from_value(&json!(null)), None);
    }

    #[test]
    fn test_system_fields_serde() {
        let all = SystemFields::All(false);
        assert_eq!(serde_json::to_value(&all).unwrap(), json!(false));

        let mut map = BTreeMap::new();
        map.insert(SystemFieldName::CreatedBy, true);
        map.insert(SystemFieldName::UpdatedAt, false);
        let selective = SystemFields::Selective(map);
        assert_eq!(
            serde_json::to_value(&selective).unwrap(),
            json!({ "createdBy": true, "updatedAt": false })
        );

        let back: SystemFields =
            serde_json::from_value(json!({ "createdBy": true, "updatedAt": false })).unwrap();
        assert_eq!(back, selective);
    }

    #[test]
    fn test_displayed_field_builder() {
        let field = DisplayedField::new("name").readonly();
        assert_eq!(field.field, "name");
        assert_eq!(field.readonly, Some(true));
        assert_eq!(field.hidden, None);

        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json, json!({ "field": "name", "readonly": true }));
    }

    #[test]
    fn test_object_title_serde() {
        let single: ObjectTitle = serde_json::from_value(json!("$name")).unwrap();
        assert_eq!(single, ObjectTitle::Single("$name".to_string()));

        let concat: ObjectTitle =
            serde_json::from_value(json!(["$specialization", " [", "$language", "]"])).unwrap();
        assert!(matches!(concat, ObjectTitle::Concat(ref parts) if parts.len() == 4));
    }
}
