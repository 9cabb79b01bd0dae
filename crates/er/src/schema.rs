//! Schema compilation
//!
//! Maps the attribute-type algebra onto concrete storage-schema primitives,
//! producing a `Schema` object usable to validate and persist documents.
//! Nested object and array attributes compile recursively, method and
//! option sub-schemas are embedded, and enabled system fields are
//! materialized as implicit paths. Compilation is all-or-nothing per
//! entity: the first failing attribute is logged with full context and the
//! error propagates.

use crate::attr::{AttrType, AttrTypeDef, EntityAttributes, OfType, SchemaOptions};
use crate::entity::Entity;
use ermeta_core::{
    ALL_SYSTEM_FIELD_NAMES, MetaError, MetaResult, OfTag, SimpleAttrType, SystemFieldName,
    convert_default_value_by_type, is_now_sentinel,
};
use regex::Regex;
use serde_json::Value;
use tracing::error;

// ============================================================================
// Schema Model
// ============================================================================

/// A compiled, named schema: an ordered map of path name to node
#[derive(Debug, Clone)]
pub struct Schema {
    /// Name of the entity the schema was compiled from
    pub name: String,

    /// Sub-schema options, for embedded schemas
    pub options: Option<SchemaOptions>,

    paths: Vec<(String, SchemaNode)>,
}

impl Schema {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
            paths: Vec::new(),
        }
    }

    // a later path with the same name overwrites the earlier one in place;
    // implicit paths (parent, options, methods) take precedence over
    // declared attributes of the same name
    fn push(&mut self, name: impl Into<String>, node: SchemaNode) {
        let name = name.into();
        if let Some(entry) = self.paths.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = node;
        } else {
            self.paths.push((name, node));
        }
    }

    /// Look up a path by name
    pub fn path(&self, name: &str) -> Option<&SchemaNode> {
        self.paths
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }

    /// Check if a path exists
    pub fn has_path(&self, name: &str) -> bool {
        self.paths.iter().any(|(n, _)| n == name)
    }

    /// Iterate over `(name, node)` pairs in declaration order
    pub fn paths(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.paths.iter().map(|(n, node)| (n.as_str(), node))
    }

    /// All path names, in declaration order
    pub fn path_names(&self) -> Vec<&str> {
        self.paths.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// One node of a compiled schema tree
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// A single field with its column type and constraints
    Field(Box<FieldSchema>),

    /// A nested map of named sub-paths
    Paths(Vec<(String, SchemaNode)>),

    /// A repeated inner node
    Array(Box<SchemaNode>),

    /// An embedded, fully compiled sub-schema
    Subschema(Box<Schema>),
}

impl SchemaNode {
    /// Get the field descriptor, if this node is a single field
    pub fn as_field(&self) -> Option<&FieldSchema> {
        match self {
            SchemaNode::Field(field) => Some(field),
            _ => None,
        }
    }

    /// Whether a document missing this path fails validation
    fn requires_value(&self) -> bool {
        match self {
            SchemaNode::Field(field) => field.required,
            _ => false,
        }
    }
}

/// The storage primitive a simple attribute type compiles to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaColumn {
    /// Text column
    Text,
    /// Numeric column
    Number,
    /// Boolean column
    Bool,
    /// Date/time column
    DateTime,
    /// Opaque reference id column
    ObjectId,
    /// Binary blob column
    Buffer,
    /// Key/value column
    Map,
    /// Repeated column; the element is described separately
    Array,
}

/// A compiled default value
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDefault {
    /// Compute the current time at write time
    Now,
    /// A literal value
    Literal(Value),
}

/// A single compiled field: column type plus per-field constraints
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Storage primitive
    pub column: SchemaColumn,

    /// Element node for `Array` and `Map` columns
    pub of: Option<Box<SchemaNode>>,

    /// Value must be present and non-null
    pub required: bool,

    /// Enforce uniqueness
    pub unique: bool,

    /// Create an index
    pub index: bool,

    /// Sparse index
    pub sparse: bool,

    /// Allowed value set
    pub enum_values: Option<Vec<Value>>,

    /// Numeric bounds
    pub min: Option<f64>,
    pub max: Option<f64>,

    /// Length bounds
    pub minlength: Option<u32>,
    pub maxlength: Option<u32>,

    /// String write transforms
    pub trim: bool,
    pub lowercase: bool,
    pub uppercase: bool,

    /// Compiled match pattern
    pub pattern: Option<Regex>,

    /// Referenced entity for reference columns
    pub references_entity: Option<String>,

    /// Default value or generator
    pub default: Option<SchemaDefault>,
}

impl FieldSchema {
    fn of_column(column: SchemaColumn) -> Self {
        Self {
            column,
            of: None,
            required: false,
            unique: false,
            index: false,
            sparse: false,
            enum_values: None,
            min: None,
            max: None,
            minlength: None,
            maxlength: None,
            trim: false,
            lowercase: false,
            uppercase: false,
            pattern: None,
            references_entity: None,
            default: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn with_enum<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn with_default(mut self, default: SchemaDefault) -> Self {
        self.default = Some(default);
        self
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Map a simple attribute type to its storage primitive
pub fn map_simple_type(attr_type: SimpleAttrType) -> SchemaColumn {
    match attr_type {
        SimpleAttrType::Array => SchemaColumn::Array,
        SimpleAttrType::ObjectId => SchemaColumn::ObjectId,
        SimpleAttrType::Boolean => SchemaColumn::Bool,
        SimpleAttrType::Number => SchemaColumn::Number,
        SimpleAttrType::String => SchemaColumn::Text,
        SimpleAttrType::Timestamp | SimpleAttrType::Date | SimpleAttrType::Time => {
            SchemaColumn::DateTime
        }
        SimpleAttrType::Entity => SchemaColumn::ObjectId,
        SimpleAttrType::Enum => SchemaColumn::Text,
        SimpleAttrType::Map => SchemaColumn::Map,
        SimpleAttrType::Buffer => SchemaColumn::Buffer,
    }
}

/// Compile an entity into a concrete storage schema
///
/// Every attribute maps to exactly one path. Failures carry entity and
/// attribute context and abort the whole compilation.
pub fn compile_schema(entity: &Entity) -> MetaResult<Schema> {
    compile_schema_with(entity, None)
}

/// Compile an entity into a schema with embedded sub-schema options
pub fn compile_schema_with(entity: &Entity, options: Option<SchemaOptions>) -> MetaResult<Schema> {
    let mut schema = Schema::new(&entity.name);
    schema.options = options;

    for (attr_name, attr) in entity.attributes.iter() {
        let node = compile_attr(&entity.name, attr_name, attr).map_err(|e| {
            error!(
                "Error mapping attribute '{}.{}': {}",
                entity.name, attr_name, e
            );
            e
        })?;
        schema.push(attr_name, node);
    }

    if entity.parent.is_some() {
        schema.push(
            "parent",
            SchemaNode::Field(Box::new(FieldSchema::of_column(SchemaColumn::Text))),
        );
    }

    if entity.options.is_some() {
        let mut options_field = FieldSchema::of_column(SchemaColumn::Map);
        options_field.of = Some(Box::new(SchemaNode::Field(Box::new(
            FieldSchema::of_column(SchemaColumn::Bool),
        ))));
        schema.push("options", SchemaNode::Field(Box::new(options_field)));
    }

    if entity.methods.is_some() {
        let mut methods_field = FieldSchema::of_column(SchemaColumn::Map);
        methods_field.of = Some(Box::new(SchemaNode::Array(Box::new(
            SchemaNode::Subschema(Box::new(method_schema())),
        ))));
        schema.push("methods", SchemaNode::Field(Box::new(methods_field)));
    }

    for name in ALL_SYSTEM_FIELD_NAMES {
        let enabled = entity
            .system_fields
            .as_ref()
            .is_some_and(|sf| sf.is_enabled(name));
        if enabled {
            schema.push(name.as_str(), system_field_node(name));
        }
    }

    Ok(schema)
}

fn system_field_node(name: SystemFieldName) -> SchemaNode {
    let field = match name {
        SystemFieldName::CreatedBy | SystemFieldName::UpdatedBy => {
            FieldSchema::of_column(SchemaColumn::ObjectId)
        }
        SystemFieldName::CreatedAt | SystemFieldName::UpdatedAt => {
            FieldSchema::of_column(SchemaColumn::DateTime).with_default(SchemaDefault::Now)
        }
    };
    SchemaNode::Field(Box::new(field))
}

fn compile_attr(entity_name: &str, attr_name: &str, attr: &AttrType) -> MetaResult<SchemaNode> {
    match attr {
        AttrType::Simple(tag) => Ok(SchemaNode::Field(Box::new(FieldSchema::of_column(
            map_simple_type(*tag),
        )))),

        AttrType::Def(def) => compile_def(entity_name, attr_name, def),

        AttrType::Nested(attrs) => {
            Ok(SchemaNode::Paths(compile_paths(entity_name, attrs)?))
        }

        AttrType::Schema(schema) => {
            let compiled = compile_schema_with(&schema.entity, schema.options.clone())?;
            Ok(SchemaNode::Subschema(Box::new(compiled)))
        }

        AttrType::Array(elements) => {
            if elements.len() != 1 {
                return Err(MetaError::InvalidArrayElement {
                    entity: entity_name.to_string(),
                    attribute: attr_name.to_string(),
                    message: "array type should have only one element".to_string(),
                });
            }
            let inner = compile_attr(entity_name, attr_name, &elements[0])?;
            Ok(SchemaNode::Array(Box::new(inner)))
        }
    }
}

fn compile_paths(
    entity_name: &str,
    attrs: &EntityAttributes,
) -> MetaResult<Vec<(String, SchemaNode)>> {
    attrs
        .iter()
        .map(|(name, attr)| {
            compile_attr(entity_name, name, attr).map(|node| (name.to_string(), node))
        })
        .collect()
}

fn compile_def(entity_name: &str, attr_name: &str, def: &AttrTypeDef) -> MetaResult<SchemaNode> {
    let tag = match &def.attr_type {
        AttrType::Simple(tag) => *tag,
        // the `type: [nestedAttrs]` rendering of array-of-objects
        AttrType::Array(elements) if elements.len() == 1 => {
            let inner = compile_attr(entity_name, attr_name, &elements[0])?;
            let mut field = constrained_field(entity_name, attr_name, SchemaColumn::Array, def)?;
            field.of = Some(Box::new(inner));
            return Ok(SchemaNode::Field(Box::new(field)));
        }
        AttrType::Nested(attrs) => {
            // a descriptive wrapper around a nested map compiles to the map
            // itself; constraints other than required do not apply
            return Ok(SchemaNode::Paths(compile_paths(entity_name, attrs)?));
        }
        other => {
            return Err(MetaError::schema_compilation(
                entity_name,
                attr_name,
                format!("unsupported declared type: {:?}", other),
            ));
        }
    };

    let mut field = constrained_field(entity_name, attr_name, map_simple_type(tag), def)?;

    if tag == SimpleAttrType::Array {
        let element = match &def.of {
            Some(OfType::Tag(of_tag)) => Some(element_node(*of_tag)),
            Some(OfType::Nested(attrs)) => Some(SchemaNode::Paths(compile_paths(
                entity_name,
                attrs,
            )?)),
            None => None,
        };
        field.of = element.map(Box::new);
    }

    Ok(SchemaNode::Field(Box::new(field)))
}

fn element_node(of_tag: OfTag) -> SchemaNode {
    let column = match of_tag.to_simple() {
        Some(simple) => map_simple_type(simple),
        None => SchemaColumn::Map,
    };
    SchemaNode::Field(Box::new(FieldSchema::of_column(column)))
}

fn constrained_field(
    entity_name: &str,
    attr_name: &str,
    column: SchemaColumn,
    def: &AttrTypeDef,
) -> MetaResult<FieldSchema> {
    let mut field = FieldSchema::of_column(column);
    field.required = def.required == Some(true);
    field.unique = def.unique == Some(true);
    field.index = def.index == Some(true);
    field.sparse = def.sparse == Some(true);
    field.enum_values = def.enum_values.clone();
    field.min = def.min;
    field.max = def.max;
    field.minlength = def.minlength;
    field.maxlength = def.maxlength;
    field.trim = def.trim == Some(true);
    field.lowercase = def.lowercase == Some(true);
    field.uppercase = def.uppercase == Some(true);
    field.references_entity = def.references_entity.clone();

    if let Some(pattern) = &def.pattern {
        let compiled = Regex::new(pattern).map_err(|e| MetaError::InvalidPattern {
            entity: entity_name.to_string(),
            attribute: attr_name.to_string(),
            message: e.to_string(),
        })?;
        field.pattern = Some(compiled);
    }

    let tag = def.attr_type.simple_tag().unwrap_or(SimpleAttrType::Array);
    let normalized =
        convert_default_value_by_type(entity_name, attr_name, tag, def.default.as_ref());
    field.default = normalized.map(|value| {
        if is_now_sentinel(&value) && tag.is_temporal() {
            SchemaDefault::Now
        } else {
            SchemaDefault::Literal(value)
        }
    });

    Ok(field)
}

// ============================================================================
// Method Sub-schema
// ============================================================================

/// The embedded schema of a stored method record
pub fn method_schema() -> Schema {
    let mut schema = Schema::new("Method");

    let text = || FieldSchema::of_column(SchemaColumn::Text);

    schema.push("id", SchemaNode::Field(Box::new(text().required())));
    schema.push("name", SchemaNode::Field(Box::new(text().required())));
    schema.push("namespace", SchemaNode::Field(Box::new(text().required())));
    schema.push(
        "environment",
        SchemaNode::Field(Box::new(
            text().required().with_enum(["server", "client"]),
        )),
    );
    schema.push("description", SchemaNode::Field(Box::new(text())));

    let param_paths = vec![
        (
            "name".to_string(),
            SchemaNode::Field(Box::new(text().required())),
        ),
        (
            "type".to_string(),
            SchemaNode::Field(Box::new(text().required())),
        ),
        (
            "required".to_string(),
            SchemaNode::Field(Box::new(FieldSchema::of_column(SchemaColumn::Bool))),
        ),
        (
            "nullable".to_string(),
            SchemaNode::Field(Box::new(FieldSchema::of_column(SchemaColumn::Bool))),
        ),
        (
            "default".to_string(),
            SchemaNode::Field(Box::new(FieldSchema::of_column(SchemaColumn::Map))),
        ),
    ];
    schema.push(
        "params",
        SchemaNode::Array(Box::new(SchemaNode::Paths(param_paths))),
    );

    schema.push("returnType", SchemaNode::Field(Box::new(text())));
    schema.push("returnDescription", SchemaNode::Field(Box::new(text())));

    let code_paths = vec![
        ("lang".to_string(), SchemaNode::Field(Box::new(text()))),
        ("code".to_string(), SchemaNode::Field(Box::new(text()))),
        ("prompt".to_string(), SchemaNode::Field(Box::new(text()))),
        (
            "derived".to_string(),
            SchemaNode::Field(Box::new(FieldSchema::of_column(SchemaColumn::Bool))),
        ),
    ];
    schema.push("code", SchemaNode::Paths(code_paths));

    schema.push(
        "order",
        SchemaNode::Field(Box::new(
            FieldSchema::of_column(SchemaColumn::Number).required(),
        )),
    );
    schema.push(
        "disabled",
        SchemaNode::Field(Box::new(FieldSchema::of_column(SchemaColumn::Bool))),
    );

    schema
}

// ============================================================================
// Document Validation
// ============================================================================

impl Schema {
    /// Validate a document against this schema
    ///
    /// Checks per-column value types, required paths, enum membership,
    /// pattern matches, numeric and length bounds, and recurses into
    /// arrays, nested paths and embedded sub-schemas. Extra keys not named
    /// by the schema are ignored.
    pub fn validate_document(&self, document: &Value) -> MetaResult<()> {
        let Value::Object(fields) = document else {
            return Err(MetaError::document_validation(
                &self.name,
                "",
                "document must be an object",
            ));
        };

        for (path, node) in &self.paths {
            match fields.get(path) {
                None | Some(Value::Null) => {
                    if node.requires_value() {
                        return Err(MetaError::document_validation(
                            &self.name,
                            path,
                            "value is required",
                        ));
                    }
                }
                Some(value) => {
                    self.validate_node(path, node, value)?;
                }
            }
        }

        Ok(())
    }

    fn validate_node(&self, path: &str, node: &SchemaNode, value: &Value) -> MetaResult<()> {
        match node {
            SchemaNode::Field(field) => self.validate_field(path, field, value),

            SchemaNode::Paths(paths) => {
                let Value::Object(fields) = value else {
                    return Err(MetaError::document_validation(
                        &self.name,
                        path,
                        "expected an object",
                    ));
                };
                for (name, sub) in paths {
                    let sub_path = format!("{}.{}", path, name);
                    match fields.get(name) {
                        None | Some(Value::Null) => {
                            if sub.requires_value() {
                                return Err(MetaError::document_validation(
                                    &self.name,
                                    sub_path,
                                    "value is required",
                                ));
                            }
                        }
                        Some(sub_value) => self.validate_node(&sub_path, sub, sub_value)?,
                    }
                }
                Ok(())
            }

            SchemaNode::Array(inner) => {
                let Value::Array(items) = value else {
                    return Err(MetaError::document_validation(
                        &self.name,
                        path,
                        "expected an array",
                    ));
                };
                for (i, item) in items.iter().enumerate() {
                    self.validate_node(&format!("{}.{}", path, i), inner, item)?;
                }
                Ok(())
            }

            SchemaNode::Subschema(schema) => schema.validate_document(value).map_err(|e| {
                MetaError::document_validation(&self.name, path, e.to_string())
            }),
        }
    }

    fn validate_field(&self, path: &str, field: &FieldSchema, value: &Value) -> MetaResult<()> {
        let fail = |message: String| {
            Err(MetaError::document_validation(&self.name, path, message))
        };

        match field.column {
            SchemaColumn::Text => {
                let Value::String(s) = value else {
                    return fail(format!("expected a string, got {}", value));
                };
                if let Some(values) = &field.enum_values {
                    if !values.contains(value) {
                        return fail(format!("'{}' is not an allowed value", s));
                    }
                }
                if let Some(pattern) = &field.pattern {
                    if !pattern.is_match(s) {
                        return fail(format!("'{}' does not match the required pattern", s));
                    }
                }
                if let Some(min) = field.minlength {
                    if s.chars().count() < min as usize {
                        return fail(format!("shorter than minimum length {}", min));
                    }
                }
                if let Some(max) = field.maxlength {
                    if s.chars().count() > max as usize {
                        return fail(format!("longer than maximum length {}", max));
                    }
                }
                Ok(())
            }

            SchemaColumn::Number => {
                let Some(n) = value.as_f64() else {
                    return fail(format!("expected a number, got {}", value));
                };
                if let Some(min) = field.min {
                    if n < min {
                        return fail(format!("below minimum value {}", min));
                    }
                }
                if let Some(max) = field.max {
                    if n > max {
                        return fail(format!("above maximum value {}", max));
                    }
                }
                Ok(())
            }

            SchemaColumn::Bool => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    fail(format!("expected a boolean, got {}", value))
                }
            }

            SchemaColumn::DateTime => {
                if is_now_sentinel(value) || ermeta_core::parse_date_value(value).is_some() {
                    Ok(())
                } else {
                    fail(format!("expected a date value, got {}", value))
                }
            }

            SchemaColumn::ObjectId => {
                let Value::String(s) = value else {
                    return fail(format!("expected an object id, got {}", value));
                };
                if crate::def::is_object_id(s) {
                    Ok(())
                } else {
                    fail(format!("'{}' is not a valid object id", s))
                }
            }

            SchemaColumn::Buffer => match value {
                Value::String(_) => Ok(()),
                Value::Array(bytes)
                    if bytes.iter().all(|b| {
                        b.as_u64().map(|n| n <= u8::MAX as u64).unwrap_or(false)
                    }) =>
                {
                    Ok(())
                }
                other => fail(format!("expected binary data, got {}", other)),
            },

            SchemaColumn::Map => {
                let Value::Object(entries) = value else {
                    return fail(format!("expected a map, got {}", value));
                };
                if let Some(of) = &field.of {
                    for (key, entry) in entries {
                        self.validate_node(&format!("{}.{}", path, key), of, entry)?;
                    }
                }
                Ok(())
            }

            SchemaColumn::Array => {
                let Value::Array(items) = value else {
                    return fail(format!("expected an array, got {}", value));
                };
                if let Some(of) = &field.of {
                    for (i, item) in items.iter().enumerate() {
                        self.validate_node(&format!("{}.{}", path, i), of, item)?;
                    }
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
