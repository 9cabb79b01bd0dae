//! Process-wide registries for entities and models
//!
//! A registry is an explicit, lifecycle-scoped lookup table from name to
//! value, passed by reference to the components that need entity or model
//! lookup. Entries are either eager values or lazy async getters; invoking
//! a getter is the only asynchronous operation in the system. Registration
//! is idempotent by default: re-registering an existing name returns the
//! existing entry unchanged unless replacement is requested.

use crate::entity::Entity;
use crate::model::Model;
use ermeta_core::{MetaError, MetaResult};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

// ============================================================================
// Registry
// ============================================================================

/// Future returned by a lazy registry getter
pub type GetterFuture<T> = Pin<Box<dyn Future<Output = MetaResult<Arc<T>>> + Send>>;

/// A lazy async getter producing a registry value on demand
///
/// Getter results are not cached; concurrent first invocations may race,
/// and results must be idempotent-safe to recompute.
pub type Getter<T> = Arc<dyn Fn() -> GetterFuture<T> + Send + Sync>;

enum Entry<T> {
    Value(Arc<T>),
    Getter(Getter<T>),
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        match self {
            Entry::Value(value) => Entry::Value(value.clone()),
            Entry::Getter(getter) => Entry::Getter(getter.clone()),
        }
    }
}

/// A name-to-value lookup table with register/replace/remove semantics
///
/// Read-modify-write sequences are serialized behind a read-write lock;
/// read-only lookups take the read lock only.
pub struct Registry<T> {
    kind: &'static str,
    entries: RwLock<HashMap<String, Entry<T>>>,
}

impl<T> Registry<T> {
    /// Create an empty registry; `kind` names the entry type in diagnostics
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register an eager value under a name
    ///
    /// Without `replace`, an existing eager value wins: it is returned
    /// unchanged with a diagnostic warning. With `replace` (or when the
    /// existing entry is a getter) the new value displaces the old entry.
    pub async fn register(&self, name: impl Into<String>, value: T, replace: bool) -> Arc<T> {
        let name = name.into();
        let mut entries = self.entries.write().await;

        if !replace {
            if let Some(Entry::Value(existing)) = entries.get(&name) {
                warn!("{} {} already registered", self.kind, name);
                return existing.clone();
            }
        }

        if entries.contains_key(&name) && replace {
            warn!("{} {} already registered... Will be replaced...", self.kind, name);
        }

        let value = Arc::new(value);
        entries.insert(name, Entry::Value(value.clone()));
        value
    }

    /// Register a lazy getter under a name, displacing any existing entry
    pub async fn register_getter(&self, name: impl Into<String>, getter: Getter<T>) {
        let mut entries = self.entries.write().await;
        entries.insert(name.into(), Entry::Getter(getter));
    }

    /// Look up a value, invoking a lazy getter when necessary
    pub async fn get(&self, name: &str) -> MetaResult<Arc<T>> {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(name).cloned()
        };

        match entry {
            Some(Entry::Value(value)) => Ok(value),
            // invoked outside the lock: getters may be slow, and first
            // invocations are allowed to race
            Some(Entry::Getter(getter)) => getter().await,
            None => Err(self.not_found(name)),
        }
    }

    /// Get a getter for an existing entry
    ///
    /// An eager value is wrapped into a synthesized getter, with a warning:
    /// values are expected to be registered as getters when lazy access is
    /// the intended pattern.
    pub async fn get_getter(&self, name: &str) -> MetaResult<Getter<T>>
    where
        T: Send + Sync + 'static,
    {
        let entries = self.entries.read().await;
        match entries.get(name) {
            Some(Entry::Getter(getter)) => Ok(getter.clone()),
            Some(Entry::Value(value)) => {
                warn!(
                    "Getter for the {} {} was created automatically. This is not recommended!",
                    self.kind, name
                );
                let value = value.clone();
                let getter: Getter<T> = Arc::new(move || {
                    let value = value.clone();
                    let fut: GetterFuture<T> = Box::pin(async move { Ok(value) });
                    fut
                });
                Ok(getter)
            }
            None => Err(self.not_found(name)),
        }
    }

    /// Check if a name is registered (eagerly or lazily)
    pub async fn is_registered(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    /// All registered names
    pub async fn names(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Remove an entry; returns whether anything was removed
    pub async fn remove(&self, name: &str) -> bool {
        self.entries.write().await.remove(name).is_some()
    }

    /// Number of entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Remove all entries
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    fn not_found(&self, name: &str) -> MetaError {
        match self.kind {
            "model" => MetaError::ModelNotFound(name.to_string()),
            _ => MetaError::EntityNotFound(name.to_string()),
        }
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("kind", &self.kind).finish()
    }
}

// ============================================================================
// Entity Registry
// ============================================================================

/// Registry of live entities, keyed by entity name
pub type EntityRegistry = Registry<Entity>;

impl Registry<Entity> {
    /// Create an empty entity registry
    pub fn entities() -> EntityRegistry {
        Registry::new("entity")
    }

    /// Register an entity under its own name
    pub async fn register_entity(&self, entity: Entity, replace: bool) -> Arc<Entity> {
        let name = entity.name.clone();
        self.register(name, entity, replace).await
    }
}

// ============================================================================
// Model Registry
// ============================================================================

/// Registry of schema-backed models, keyed by model name
pub type ModelRegistry = Registry<Model>;

impl Registry<Model> {
    /// Create an empty model registry
    pub fn models() -> ModelRegistry {
        Registry::new("model")
    }

    /// Compile an entity's schema and register the resulting model
    pub async fn register_for_entity(
        &self,
        entity: &Entity,
        replace: bool,
    ) -> MetaResult<Arc<Model>> {
        let model = Model::for_entity(entity)?;
        Ok(self.register(entity.name.clone(), model, replace).await)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use ermeta_core::SimpleAttrType;

    #[tokio::test]
    async fn test_idempotent_registration() {
        let registry = Registry::entities();
        let entity = fixtures::test_entity();

        let first = registry.register_entity(entity.clone(), false).await;
        let second = registry.register_entity(entity.clone(), false).await;

        // same reference both times, exactly one entry
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let registry = Registry::entities();
        let entity = fixtures::test_entity();

        let first = registry.register_entity(entity.clone(), false).await;

        let mut changed = entity.clone();
        changed.label = Some("Changed".to_string());
        let second = registry.register_entity(changed, true).await;

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.label.as_deref(), Some("Changed"));

        let current = registry.get("Test").await.unwrap();
        assert_eq!(current.label.as_deref(), Some("Changed"));
    }

    #[tokio::test]
    async fn test_get_unknown_fails() {
        let registry = Registry::entities();
        let err = registry.get("Missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lazy_getter() {
        let registry = Registry::entities();

        registry
            .register_getter(
                "Lazy",
                Arc::new(|| {
                    Box::pin(async {
                        Ok(Arc::new(
                            Entity::new("Lazy").with_attribute("name", SimpleAttrType::String),
                        ))
                    })
                }),
            )
            .await;

        assert!(registry.is_registered("Lazy").await);

        let entity = registry.get("Lazy").await.unwrap();
        assert_eq!(entity.name, "Lazy");

        // results are recomputed per invocation
        let again = registry.get("Lazy").await.unwrap();
        assert!(!Arc::ptr_eq(&entity, &again));
    }

    #[tokio::test]
    async fn test_eager_value_displaces_getter() {
        let registry = Registry::entities();

        registry
            .register_getter(
                "Test",
                Arc::new(|| Box::pin(async { Ok(Arc::new(Entity::new("Test"))) })),
            )
            .await;

        // an eager value replaces the getter even without `replace`
        let value = registry
            .register_entity(fixtures::test_entity(), false)
            .await;
        let fetched = registry.get("Test").await.unwrap();
        assert!(Arc::ptr_eq(&value, &fetched));
    }

    #[tokio::test]
    async fn test_synthesized_getter() {
        let registry = Registry::entities();
        registry
            .register_entity(fixtures::test_entity(), false)
            .await;

        let getter = registry.get_getter("Test").await.unwrap();
        let entity = getter().await.unwrap();
        assert_eq!(entity.name, "Test");

        assert!(registry.get_getter("Missing").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let registry = Registry::entities();
        registry
            .register_entity(fixtures::test_entity(), false)
            .await;

        assert!(registry.remove("Test").await);
        assert!(!registry.remove("Test").await);
        assert!(!registry.is_registered("Test").await);

        registry
            .register_entity(fixtures::test_entity(), false)
            .await;
        registry.clear().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_model_registry_for_entity() {
        let registry = Registry::models();
        let entity = fixtures::test_entity();

        let model = registry.register_for_entity(&entity, false).await.unwrap();
        assert_eq!(model.name, "Test");
        assert!(registry.is_registered("Test").await);

        let err = registry.get("Missing").await.unwrap_err();
        assert!(matches!(err, MetaError::ModelNotFound(_)));

        let names = registry.names().await;
        assert_eq!(names, vec!["Test".to_string()]);
    }

    #[tokio::test]
    async fn test_registered_model_validates_documents() {
        let registry = Registry::models();
        let entity = fixtures::test_entity();
        registry.register_for_entity(&entity, false).await.unwrap();

        let model = registry.get("Test").await.unwrap();
        let doc = serde_json::json!({
            "name": "Test",
            "email": "mail@example.com",
            "requiredString10_20": "1234567890"
        });
        assert!(model.create(doc).is_ok());
    }
}
