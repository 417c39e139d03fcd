//! Key-value storage for persisted reports.
//!
//! Every call is a discrete operation that can fail on its own; batching
//! and failure policy live in [`crate::sink`].

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::types::StoredReport;
use std::collections::BTreeMap;

/// A store addressed by a per-record identifier.
pub trait KeyValueStore: Send {
    /// All currently stored records.
    fn scan(&self) -> Result<Vec<StoredReport>, StoreError>;
    /// Write a record under its `id`, overwriting any previous record with that id.
    fn put(&mut self, item: &StoredReport) -> Result<(), StoreError>;
    /// Remove the record with this id. Removing a missing id is not an error.
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;
}

/// In-memory store, ordered by id. Used for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: BTreeMap<String, StoredReport>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&StoredReport> {
        self.items.get(id)
    }
}

impl KeyValueStore for MemoryStore {
    fn scan(&self) -> Result<Vec<StoredReport>, StoreError> {
        Ok(self.items.values().cloned().collect())
    }

    fn put(&mut self, item: &StoredReport) -> Result<(), StoreError> {
        self.items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.items.remove(id);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn scan(&self) -> Result<Vec<StoredReport>, StoreError> {
        (**self).scan()
    }

    fn put(&mut self, item: &StoredReport) -> Result<(), StoreError> {
        (**self).put(item)
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        (**self).delete(id)
    }
}
