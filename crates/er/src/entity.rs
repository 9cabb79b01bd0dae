//! Entity definitions
//!
//! This module contains the `Entity` struct — the in-memory, developer-facing
//! description of a record type — and the lifecycle `Method` types attached
//! to it.

use crate::attr::{AttrType, EntityAttributes, OfType, validate_attr_type};
use ermeta_core::{
    MetaError, MetaResult, MethodEnvironment, MethodType, Named, ObjectTitle, Persistable,
    SystemFields, Validatable, deserialize_explicit_value, deserialize_system_fields,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// ============================================================================
// Entity
// ============================================================================

/// Methods grouped by the lifecycle hook they attach to
pub type EntityMethods = BTreeMap<MethodType, Vec<Method>>;

/// In-memory description of a record type and its attributes
///
/// Conversions to and from the persisted form produce new objects; an
/// `Entity` is immutable in spirit, although the registry allows in-place
/// replacement by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Full name of the entity this one inherits from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Namespace the entity belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the entity; unique within the namespace
    pub name: String,

    /// Label for use in the user interface
    ///
    /// If not specified, the name is used as the label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Detailed description of the entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Object title template used when rendering record titles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_title: Option<ObjectTitle>,

    /// The attributes, in display order
    pub attributes: EntityAttributes,

    /// Boolean feature flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, bool>>,

    /// Lifecycle methods grouped by hook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<EntityMethods>,

    /// Configuration of the implicit system fields
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_system_fields"
    )]
    pub system_fields: Option<SystemFields>,

    /// Abstract base entity; cannot be instantiated directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abc: Option<bool>,

    /// Custom page for viewing the entity's records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_form: Option<String>,

    /// Custom page for creating/editing/viewing a single record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dlg_form: Option<String>,
}

impl Entity {
    /// Create a new entity with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            parent: None,
            namespace: None,
            name: name.into(),
            label: None,
            description: None,
            object_title: None,
            attributes: EntityAttributes::new(),
            options: None,
            methods: None,
            system_fields: None,
            abc: None,
            view_form: None,
            dlg_form: None,
        }
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the parent entity name
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the object title template
    pub fn with_object_title(mut self, title: impl Into<ObjectTitle>) -> Self {
        self.object_title = Some(title.into());
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, attr: impl Into<AttrType>) -> Self {
        self.attributes.insert(name, attr);
        self
    }

    /// Add a method under the given lifecycle hook
    pub fn with_method(mut self, hook: MethodType, method: Method) -> Self {
        self.methods
            .get_or_insert_with(BTreeMap::new)
            .entry(hook)
            .or_default()
            .push(method);
        self
    }

    /// Set the system-fields configuration
    pub fn with_system_fields(mut self, system_fields: impl Into<SystemFields>) -> Self {
        self.system_fields = Some(system_fields.into());
        self
    }

    /// Mark the entity as abstract
    pub fn abstract_base(mut self) -> Self {
        self.abc = Some(true);
        self
    }

    /// Set the view form page
    pub fn with_view_form(mut self, form: impl Into<String>) -> Self {
        self.view_form = Some(form.into());
        self
    }

    /// Set the dialog form page
    pub fn with_dlg_form(mut self, form: impl Into<String>) -> Self {
        self.dlg_form = Some(form.into());
        self
    }

    // ========================================================================
    // Query methods
    // ========================================================================

    /// Get the full name, including the namespace when present
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    /// Compare against another entity's full name
    pub fn same_name_as(&self, other: &str) -> bool {
        self.full_name() == other || self.name == other
    }

    /// Check if an attribute name is declared
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    /// Number of declared attributes
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Get the methods of one lifecycle hook, sorted by ascending order
    ///
    /// Disabled methods are skipped.
    pub fn methods_for(&self, hook: MethodType) -> Vec<&Method> {
        let mut methods: Vec<&Method> = self
            .methods
            .as_ref()
            .and_then(|m| m.get(&hook))
            .map(|list| {
                list.iter()
                    .filter(|m| m.disabled != Some(true))
                    .collect()
            })
            .unwrap_or_default();
        methods.sort_by_key(|m| m.order);
        methods
    }

    // ========================================================================
    // Compaction
    // ========================================================================

    /// Produce the reduced form of this entity
    ///
    /// The reduced form is what the persisted representation can encode
    /// losslessly: `required: false` keys are stripped, definitions that
    /// carry nothing beyond a bare tag collapse to the tag shorthand,
    /// built-in methods are excluded and method groups left empty by the
    /// exclusion are dropped. The round-trip guarantee is stated over this
    /// form: `def_to_entity(entity_to_def(e.reduce())) == e.reduce()`.
    pub fn reduce(&self) -> Entity {
        let mut reduced = self.clone();
        reduced.attributes = reduce_attributes(&self.attributes);
        reduced.methods = self.methods.as_ref().and_then(|methods| {
            let kept: EntityMethods = methods
                .iter()
                .map(|(hook, list)| {
                    let list: Vec<Method> = list
                        .iter()
                        .filter(|m| !m.is_built_in())
                        .cloned()
                        .collect();
                    (*hook, list)
                })
                .filter(|(_, list)| !list.is_empty())
                .collect();
            if kept.is_empty() { None } else { Some(kept) }
        });
        reduced
    }
}

fn reduce_attributes(attrs: &EntityAttributes) -> EntityAttributes {
    attrs
        .iter()
        .map(|(name, attr)| (name.to_string(), reduce_attr(attr)))
        .collect()
}

fn reduce_attr(attr: &AttrType) -> AttrType {
    match attr {
        AttrType::Simple(t) => AttrType::Simple(*t),
        AttrType::Def(def) => {
            let mut def = (**def).clone();
            if def.required == Some(false) {
                def.required = None;
            }
            def.attr_type = reduce_attr(&def.attr_type);
            if let Some(OfType::Nested(attrs)) = &def.of {
                def.of = Some(OfType::Nested(reduce_attributes(attrs)));
            }
            def.collapse()
        }
        AttrType::Nested(attrs) => AttrType::Nested(reduce_attributes(attrs)),
        AttrType::Schema(schema) => {
            let mut schema = schema.clone();
            schema.entity = Box::new(schema.entity.reduce());
            AttrType::Schema(schema)
        }
        AttrType::Array(elements) => AttrType::Array(elements.iter().map(reduce_attr).collect()),
    }
}

impl Validatable for Entity {
    fn validate(&self) -> MetaResult<()> {
        if self.name.is_empty() {
            return Err(MetaError::entity_validation(
                &self.name,
                "Entity name cannot be empty",
            ));
        }

        for (attr_name, attr) in self.attributes.iter() {
            if attr_name.is_empty() {
                return Err(MetaError::MissingAttributeName {
                    entity: self.name.clone(),
                });
            }
            validate_attr_type(&self.name, attr_name, attr)?;
        }

        if let Some(methods) = &self.methods {
            for list in methods.values() {
                for method in list {
                    method.validate().map_err(|e| {
                        MetaError::entity_validation(&self.name, e.to_string())
                    })?;
                }
            }
        }

        Ok(())
    }
}

impl Named for Entity {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Persistable for Entity {}

// ============================================================================
// Method
// ============================================================================

/// Future returned by an attached method hook
pub type MethodFuture = Pin<Box<dyn Future<Output = MetaResult<Value>> + Send>>;

/// An attached hook implementation
///
/// Hooks are process-local closures; they are never persisted and are
/// expected to be re-attached by the hosting application after an entity is
/// reconstructed from its stored definition.
#[derive(Clone)]
pub struct MethodHook(pub Arc<dyn Fn(Entity, Value) -> MethodFuture + Send + Sync>);

impl MethodHook {
    /// Wrap a closure as a hook
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(Entity, Value) -> MethodFuture + Send + Sync + 'static,
    {
        MethodHook(Arc::new(hook))
    }

    /// Invoke the hook
    pub async fn call(&self, entity: Entity, record: Value) -> MetaResult<Value> {
        (self.0)(entity, record).await
    }
}

impl std::fmt::Debug for MethodHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MethodHook(..)")
    }
}

impl PartialEq for MethodHook {
    // hooks are opaque; two methods compare equal regardless of attachment
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// A named, ordered, environment-scoped lifecycle method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    /// Stable method identifier (`namespace:name`)
    pub id: String,

    /// Method name
    pub name: String,

    /// Namespace the method belongs to
    pub namespace: String,

    /// Execution environment
    pub environment: MethodEnvironment,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<MethodParam>>,

    /// Declared return type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,

    /// Description of the return value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_description: Option<String>,

    /// Source code of the method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<MethodCode>,

    /// Attached implementation; never persisted
    #[serde(skip)]
    pub hook: Option<MethodHook>,

    /// Execution order within the hook group, ascending
    pub order: i32,

    /// Whether the method is disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    /// System-provided method, excluded from the persisted form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_in: Option<bool>,
}

impl Method {
    /// Create a method with the given identity and environment
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        environment: MethodEnvironment,
    ) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        Self {
            id: format!("{}:{}", namespace, name),
            name,
            namespace,
            environment,
            description: None,
            params: None,
            return_type: None,
            return_description: None,
            code: None,
            hook: None,
            order: 0,
            disabled: None,
            built_in: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the source code
    pub fn with_code(mut self, lang: impl Into<String>, code: impl Into<String>) -> Self {
        self.code = Some(MethodCode {
            lang: lang.into(),
            code: code.into(),
            prompt: None,
            derived: None,
        });
        self
    }

    /// Set the execution order
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Attach an implementation hook
    pub fn with_hook(mut self, hook: MethodHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Mark as system-provided
    pub fn built_in(mut self) -> Self {
        self.built_in = Some(true);
        self
    }

    /// Check if this method is system-provided
    pub fn is_built_in(&self) -> bool {
        self.built_in == Some(true)
    }
}

impl Validatable for Method {
    fn validate(&self) -> MetaResult<()> {
        if self.name.is_empty() {
            return Err(MetaError::validation("Method name cannot be empty"));
        }
        if self.id.is_empty() {
            return Err(MetaError::validation("Method id cannot be empty"));
        }
        Ok(())
    }
}

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodParam {
    /// Parameter name
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub param_type: String,

    /// Whether the parameter is mandatory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Whether null is a legal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    /// Declared default value
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_explicit_value"
    )]
    pub default: Option<Value>,
}

/// Source code attached to a method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCode {
    /// Language of the code, e.g. `js`
    pub lang: String,

    /// The code itself
    pub code: String,

    /// Prompt the code was generated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Whether the code is still derived from the prompt
    ///
    /// Switched off once the code is edited by hand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<bool>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrTypeDef;
    use ermeta_core::{DisplayedField, SimpleAttrType};
    use pretty_assertions::assert_eq;

    fn sample_entity() -> Entity {
        Entity::new("User")
            .with_namespace("sys")
            .with_object_title("$name")
            .with_attribute(
                "name",
                AttrTypeDef::of_type(SimpleAttrType::String).required(),
            )
            .with_attribute("note", SimpleAttrType::String)
    }

    #[test]
    fn test_entity_builder() {
        let entity = sample_entity();
        assert_eq!(entity.name, "User");
        assert_eq!(entity.full_name(), "sys:User");
        assert!(entity.has_attribute("name"));
        assert!(!entity.has_attribute("email"));
        assert_eq!(entity.attribute_count(), 2);
    }

    #[test]
    fn test_entity_name_comparison() {
        let entity = sample_entity();
        assert!(entity.same_name_as("sys:User"));
        assert!(entity.same_name_as("User"));
        assert!(!entity.same_name_as("sys:Role"));

        let bare = Entity::new("Role");
        assert_eq!(bare.full_name(), "Role");
    }

    #[test]
    fn test_entity_validation() {
        assert!(sample_entity().validate().is_ok());

        let unnamed = Entity::new("");
        assert!(unnamed.validate().is_err());

        let bad_enum = Entity::new("Test").with_attribute(
            "state",
            AttrTypeDef::of_type(SimpleAttrType::String).with_enum(Vec::<serde_json::Value>::new()),
        );
        assert!(bad_enum.validate().is_err());

        let bad_ref = Entity::new("Test")
            .with_attribute("owner", AttrTypeDef::of_type(SimpleAttrType::ObjectId));
        assert!(bad_ref.validate().is_err());
    }

    #[test]
    fn test_methods_for_sorted_and_filtered() {
        let entity = Entity::new("Test")
            .with_attribute("name", SimpleAttrType::String)
            .with_method(
                MethodType::BeforePost,
                Method::new("sys", "second", MethodEnvironment::Server).with_order(2),
            )
            .with_method(
                MethodType::BeforePost,
                Method::new("sys", "first", MethodEnvironment::Server).with_order(1),
            )
            .with_method(MethodType::BeforePost, {
                let mut m = Method::new("sys", "off", MethodEnvironment::Server).with_order(0);
                m.disabled = Some(true);
                m
            });

        let names: Vec<&str> = entity
            .methods_for(MethodType::BeforePost)
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(entity.methods_for(MethodType::AfterPost).is_empty());
    }

    #[test]
    fn test_reduce_strips_required_false_and_collapses() {
        let entity = Entity::new("Test")
            .with_attribute(
                "plain",
                AttrTypeDef {
                    required: Some(false),
                    ..AttrTypeDef::of_type(SimpleAttrType::String)
                },
            )
            .with_attribute(
                "kept",
                AttrTypeDef::of_type(SimpleAttrType::String).required(),
            );

        let reduced = entity.reduce();
        assert_eq!(
            reduced.attributes.get("plain"),
            Some(&AttrType::Simple(SimpleAttrType::String))
        );
        assert!(reduced.attributes.get("kept").unwrap().is_def());
    }

    #[test]
    fn test_reduce_recurses_into_nested_elements() {
        let nested = EntityAttributes::new().with(
            "role",
            AttrTypeDef {
                required: Some(false),
                ..AttrTypeDef::of_type(SimpleAttrType::String)
            },
        );
        let entity = Entity::new("Chat").with_attribute(
            "data",
            AttrTypeDef::of_type(SimpleAttrType::Array).with_of(nested),
        );

        let reduced = entity.reduce();
        let def = reduced.attributes.get("data").unwrap().as_def().unwrap();
        let of = def.of.as_ref().unwrap().as_nested().unwrap();
        assert_eq!(of.get("role"), Some(&AttrType::Simple(SimpleAttrType::String)));
    }

    #[test]
    fn test_reduce_excludes_built_in_methods() {
        let entity = Entity::new("Test")
            .with_attribute("name", SimpleAttrType::String)
            .with_method(
                MethodType::BeforeSubmit,
                Method::new("sys", "log", MethodEnvironment::Server),
            )
            .with_method(
                MethodType::AfterSubmit,
                Method::new("sys", "audit", MethodEnvironment::Server).built_in(),
            );

        let reduced = entity.reduce();
        let methods = reduced.methods.unwrap();
        assert!(methods.contains_key(&MethodType::BeforeSubmit));
        assert!(!methods.contains_key(&MethodType::AfterSubmit));

        let only_built_in = Entity::new("Test")
            .with_attribute("name", SimpleAttrType::String)
            .with_method(
                MethodType::AfterSubmit,
                Method::new("sys", "audit", MethodEnvironment::Server).built_in(),
            );
        assert_eq!(only_built_in.reduce().methods, None);
    }

    #[test]
    fn test_entity_serde_round_trip() {
        let entity = sample_entity()
            .with_system_fields(false)
            .with_attribute(
                "owner",
                AttrTypeDef::of_type(SimpleAttrType::ObjectId)
                    .references("sys:User")
                    .with_displayed_fields([DisplayedField::new("name").readonly()]),
            );

        let json = entity.to_json().unwrap();
        let back = Entity::from_json(&json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_method_hook_ignored_by_equality() {
        let plain = Method::new("sys", "log", MethodEnvironment::Server);
        let hooked = plain.clone().with_hook(MethodHook::new(|_, record| {
            Box::pin(async move { Ok(record) })
        }));
        assert_eq!(plain, hooked);
    }

    #[tokio::test]
    async fn test_method_hook_invocation() {
        let hook = MethodHook::new(|_, record| {
            Box::pin(async move {
                let mut record = record;
                record["seen"] = serde_json::json!(true);
                Ok(record)
            })
        });

        let entity = Entity::new("Test").with_attribute("name", SimpleAttrType::String);
        let result = hook.call(entity, serde_json::json!({})).await.unwrap();
        assert_eq!(result["seen"], serde_json::json!(true));
    }
}
