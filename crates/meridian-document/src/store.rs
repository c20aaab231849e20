//! Meridian Backing Store
//!
//! The raw document-store operations the storage engine is built on, and an
//! in-process implementation of them.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::aggregate::{AggregationProvider, GroupCount, MultiGroupCount};
use crate::collection::Collection;
use crate::query::Query;
use crate::types::{Record, RecordKey, Value};
use meridian_common::{MeridianError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Backing Store
// =============================================================================

/// A document store holding named collections.
///
/// Connectivity problems are reported as `TransientStorageFault`; every
/// other error is permanent for the call that produced it.
pub trait BackingStore: AggregationProvider + Send + Sync {
    /// Create a collection, capped to `capped_size` bytes when given.
    /// Fails with `DatasetAlreadyExists` if the name is taken.
    fn create_collection(&self, name: &str, capped_size: Option<u64>) -> Result<()>;

    fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Atomically insert or overwrite the record stored under `key`.
    /// Saving into a missing collection creates it uncapped.
    fn save(&self, name: &str, key: &RecordKey, record: &Record) -> Result<()>;

    fn find(&self, name: &str, query: &Query) -> Result<Vec<Record>>;

    /// Largest value of `field` across the collection.
    fn max_value(&self, name: &str, field: &str) -> Result<Option<Value>>;

    /// Remove every record, keeping the collection and its options.
    /// Fails with `DatasetNotFound` if there is no such collection.
    fn clear(&self, name: &str) -> Result<()>;

    /// Round trip to the store.
    fn ping(&self) -> Result<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-process backing store.
///
/// Availability can be switched off to model a lost connection: while
/// unavailable every operation fails with a transient fault.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store becoming reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of records held by a collection, if it exists.
    pub fn count(&self, name: &str) -> Option<usize> {
        self.collections.read().get(name).map(Collection::count)
    }

    /// Cap of a collection: `Some(None)` for an uncapped one.
    pub fn cap_size(&self, name: &str) -> Option<Option<u64>> {
        self.collections.read().get(name).map(Collection::cap_size)
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MeridianError::TransientStorageFault(
                "backing store unreachable".to_string(),
            ))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for MemoryStore {
    fn create_collection(&self, name: &str, capped_size: Option<u64>) -> Result<()> {
        self.check_available()?;
        let mut collections = self.collections.write();

        if collections.contains_key(name) {
            return Err(MeridianError::DatasetAlreadyExists(name.to_string()));
        }

        let collection = match capped_size {
            Some(size) => Collection::capped(name, size),
            None => Collection::new(name),
        };
        collections.insert(name.to_string(), collection);
        Ok(())
    }

    fn collection_exists(&self, name: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.collections.read().contains_key(name))
    }

    fn save(&self, name: &str, key: &RecordKey, record: &Record) -> Result<()> {
        self.check_available()?;
        let mut collections = self.collections.write();
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name));

        let evicted = collection.upsert(key.clone(), record.clone());
        if evicted > 0 {
            tracing::debug!("Evicted {} records from capped collection '{}'", evicted, name);
        }
        Ok(())
    }

    fn find(&self, name: &str, query: &Query) -> Result<Vec<Record>> {
        self.check_available()?;
        let collections = self.collections.read();
        Ok(collections
            .get(name)
            .map(|c| c.find(query))
            .unwrap_or_default())
    }

    fn max_value(&self, name: &str, field: &str) -> Result<Option<Value>> {
        self.check_available()?;
        let collections = self.collections.read();
        Ok(collections.get(name).and_then(|c| c.max_value(field)))
    }

    fn clear(&self, name: &str) -> Result<()> {
        self.check_available()?;
        match self.collections.write().get_mut(name) {
            Some(collection) => {
                collection.clear();
                Ok(())
            }
            None => Err(MeridianError::DatasetNotFound(name.to_string())),
        }
    }

    fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

impl AggregationProvider for MemoryStore {
    fn group(&self, dataset: &str, key: &str, query: &Query) -> Result<Vec<GroupCount>> {
        self.check_available()?;
        let collections = self.collections.read();
        Ok(collections
            .get(dataset)
            .map(|c| c.group(key, query))
            .unwrap_or_default())
    }

    fn multi_group(
        &self,
        dataset: &str,
        key: &str,
        subkey: &str,
        query: &Query,
    ) -> Result<Vec<MultiGroupCount>> {
        self.check_available()?;
        let collections = self.collections.read();
        Ok(collections
            .get(dataset)
            .map(|c| c.multi_group(key, subkey, query))
            .unwrap_or_default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> RecordKey {
        RecordKey::String(id.to_string())
    }

    #[test]
    fn test_create_and_exists() {
        let store = MemoryStore::new();
        assert!(!store.collection_exists("foo_bar").unwrap());

        store.create_collection("foo_bar", Some(100)).unwrap();
        assert!(store.collection_exists("foo_bar").unwrap());
        assert_eq!(store.cap_size("foo_bar"), Some(Some(100)));
    }

    #[test]
    fn test_create_duplicate_fails() {
        let store = MemoryStore::new();
        store.create_collection("foo_bar", None).unwrap();
        let err = store.create_collection("foo_bar", Some(10)).unwrap_err();

        assert!(matches!(err, MeridianError::DatasetAlreadyExists(name) if name == "foo_bar"));
        assert_eq!(store.cap_size("foo_bar"), Some(None));
    }

    #[test]
    fn test_save_creates_missing_collection() {
        let store = MemoryStore::new();
        store
            .save("foo_bar", &key("first"), &Record::new().with("_id", "first"))
            .unwrap();

        assert_eq!(store.count("foo_bar"), Some(1));
        assert_eq!(store.cap_size("foo_bar"), Some(None));
    }

    #[test]
    fn test_reads_on_missing_collection_are_empty() {
        let store = MemoryStore::new();
        assert!(store.find("nope", &Query::new()).unwrap().is_empty());
        assert_eq!(store.max_value("nope", "_updated_at").unwrap(), None);
        assert!(store.group("nope", "kind", &Query::new()).unwrap().is_empty());
    }

    #[test]
    fn test_clear_missing_collection_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.clear("nope"),
            Err(MeridianError::DatasetNotFound(_))
        ));
        assert_eq!(store.count("nope"), None);
    }

    #[test]
    fn test_unavailable_store_faults_transiently() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(store.ping().is_err());
        let err = store
            .save("foo_bar", &key("first"), &Record::new())
            .unwrap_err();
        assert!(err.is_retryable());

        store.set_available(true);
        assert!(store.ping().is_ok());
    }
}
