//! The definition-store boundary
//!
//! Persisted entity definitions live in an external document store. The
//! core only needs the operations below; real engines implement
//! `DefinitionStore`, and `MemoryDefinitionStore` is the in-memory
//! reference implementation used by tests and embedded setups.

use crate::def::{EntityDef, EntityDefDocument, generate_object_id};
use async_trait::async_trait;
use ermeta_core::{MetaResult, Validatable};
use tokio::sync::RwLock;

// ============================================================================
// DefinitionFilter
// ============================================================================

/// Filter over stored definition documents; set fields must all match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionFilter {
    /// Match the document id
    pub id: Option<String>,

    /// Match the entity name
    pub name: Option<String>,

    /// Match the namespace
    pub namespace: Option<String>,
}

impl DefinitionFilter {
    /// A filter matching everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter by document id
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Filter by entity name
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Additionally filter by namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Check a document against this filter
    pub fn matches(&self, doc: &EntityDefDocument) -> bool {
        self.id.as_ref().is_none_or(|id| *id == doc.id)
            && self.name.as_ref().is_none_or(|name| *name == doc.def.name)
            && self
                .namespace
                .as_ref()
                .is_none_or(|ns| Some(ns) == doc.def.namespace.as_ref())
    }
}

// ============================================================================
// DefinitionStore
// ============================================================================

/// Operations the core needs from the definition store
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Validate a definition without persisting it
    async fn validate(&self, def: &EntityDef) -> MetaResult<()>;

    /// Persist a definition, returning the stored document with its id
    async fn create(&self, def: &EntityDef) -> MetaResult<EntityDefDocument>;

    /// Find the first matching document
    async fn find_one(&self, filter: &DefinitionFilter) -> MetaResult<Option<EntityDefDocument>>;

    /// Replace the definition of the first matching document
    ///
    /// Returns the document as it was before the update, or `None` when
    /// nothing matched.
    async fn find_one_and_update(
        &self,
        filter: &DefinitionFilter,
        def: &EntityDef,
    ) -> MetaResult<Option<EntityDefDocument>>;

    /// Find all matching documents
    async fn find(&self, filter: &DefinitionFilter) -> MetaResult<Vec<EntityDefDocument>>;

    /// Delete all matching documents
    async fn delete_many(&self, filter: &DefinitionFilter) -> MetaResult<u64>;
}

// ============================================================================
// MemoryDefinitionStore
// ============================================================================

/// In-memory reference implementation of the definition store
#[derive(Debug, Default)]
pub struct MemoryDefinitionStore {
    docs: RwLock<Vec<EntityDefDocument>>,
}

impl MemoryDefinitionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl DefinitionStore for MemoryDefinitionStore {
    async fn validate(&self, def: &EntityDef) -> MetaResult<()> {
        def.validate()
    }

    async fn create(&self, def: &EntityDef) -> MetaResult<EntityDefDocument> {
        def.validate()?;
        let doc = EntityDefDocument::new(generate_object_id(), def.clone());
        self.docs.write().await.push(doc.clone());
        Ok(doc)
    }

    async fn find_one(&self, filter: &DefinitionFilter) -> MetaResult<Option<EntityDefDocument>> {
        let docs = self.docs.read().await;
        Ok(docs.iter().find(|d| filter.matches(d)).cloned())
    }

    async fn find_one_and_update(
        &self,
        filter: &DefinitionFilter,
        def: &EntityDef,
    ) -> MetaResult<Option<EntityDefDocument>> {
        def.validate()?;
        let mut docs = self.docs.write().await;

        let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) else {
            return Ok(None);
        };

        let previous = doc.clone();
        doc.def = def.clone();
        Ok(Some(previous))
    }

    async fn find(&self, filter: &DefinitionFilter) -> MetaResult<Vec<EntityDefDocument>> {
        let docs = self.docs.read().await;
        Ok(docs.iter().filter(|d| filter.matches(d)).cloned().collect())
    }

    async fn delete_many(&self, filter: &DefinitionFilter) -> MetaResult<u64> {
        let mut docs = self.docs.write().await;
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
