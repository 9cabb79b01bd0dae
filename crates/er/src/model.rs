//! Schema-backed model handles
//!
//! A `Model` pairs a compiled schema with a record collection and exposes
//! the record operations the surrounding application expects from the
//! storage engine. The collection here is in-memory; it is the reference
//! implementation of the storage collaborator, sufficient for tests and
//! embedded use. Real engines sit behind the same operations.

use crate::entity::Entity;
use crate::schema::{Schema, compile_schema};
use ermeta_core::{MetaError, MetaResult};
use serde_json::Value;
use std::sync::{Arc, RwLock};

// ============================================================================
// Model
// ============================================================================

/// A named, schema-backed record collection
#[derive(Debug)]
pub struct Model {
    /// Model name; the registry key
    pub name: String,

    schema: Arc<Schema>,
    records: RwLock<Vec<Value>>,
}

impl Model {
    /// Create a model over a compiled schema
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema),
            records: RwLock::new(Vec::new()),
        }
    }

    /// Compile an entity's schema and create a model for it
    pub fn for_entity(entity: &Entity) -> MetaResult<Model> {
        let schema = compile_schema(entity)?;
        Ok(Model::new(&entity.name, schema))
    }

    /// The compiled schema backing this model
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate a document without storing it
    pub fn validate(&self, document: &Value) -> MetaResult<()> {
        self.schema.validate_document(document)
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Validate and store a document, assigning an `_id` when missing
    ///
    /// Returns the stored record.
    pub fn create(&self, document: Value) -> MetaResult<Value> {
        self.schema.validate_document(&document)?;

        let mut record = document;
        if record.get("_id").is_none() {
            record["_id"] = Value::String(crate::def::generate_object_id());
        }

        let mut records = self.write_records()?;
        records.push(record.clone());
        Ok(record)
    }

    /// Find the first record whose fields equal every key of the filter
    pub fn find_one(&self, filter: &Value) -> MetaResult<Option<Value>> {
        let records = self.read_records()?;
        Ok(records.iter().find(|r| matches_filter(r, filter)).cloned())
    }

    /// Find all records matching the filter
    pub fn find(&self, filter: &Value) -> MetaResult<Vec<Value>> {
        let records = self.read_records()?;
        Ok(records
            .iter()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect())
    }

    /// Update the first matching record with the update's fields
    ///
    /// Returns the record as it was before the update, or `None` when
    /// nothing matched.
    pub fn find_one_and_update(&self, filter: &Value, update: &Value) -> MetaResult<Option<Value>> {
        let mut records = self.write_records()?;

        let Some(record) = records.iter_mut().find(|r| matches_filter(r, filter)) else {
            return Ok(None);
        };

        let previous = record.clone();
        if let (Value::Object(target), Value::Object(fields)) = (&mut *record, update) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(Some(previous))
    }

    /// Delete all matching records, returning how many were removed
    pub fn delete_many(&self, filter: &Value) -> MetaResult<u64> {
        let mut records = self.write_records()?;
        let before = records.len();
        records.retain(|r| !matches_filter(r, filter));
        Ok((before - records.len()) as u64)
    }

    /// Number of stored records
    pub fn count(&self) -> MetaResult<u64> {
        Ok(self.read_records()?.len() as u64)
    }

    fn read_records(&self) -> MetaResult<std::sync::RwLockReadGuard<'_, Vec<Value>>> {
        self.records
            .read()
            .map_err(|_| MetaError::internal("model record lock poisoned"))
    }

    fn write_records(&self) -> MetaResult<std::sync::RwLockWriteGuard<'_, Vec<Value>>> {
        self.records
            .write()
            .map_err(|_| MetaError::internal("model record lock poisoned"))
    }
}

/// An empty filter matches everything; otherwise every filter key must
/// equal the record's value at that key.
fn matches_filter(record: &Value, filter: &Value) -> bool {
    match filter {
        Value::Object(fields) => fields
            .iter()
            .all(|(key, expected)| record.get(key) == Some(expected)),
        Value::Null => true,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
