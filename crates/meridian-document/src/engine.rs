//! Meridian Storage Engine
//!
//! Durable per-dataset storage on top of a backing store. Saves are
//! identifier-keyed upserts wrapped in a bounded retry; every other
//! operation passes backing-store errors through untouched.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::aggregate::{AggregationProvider, GroupCount, MultiGroupCount};
use crate::query::Query;
use crate::retry::retry_transient;
use crate::store::BackingStore;
use crate::types::{ObjectId, Record, RecordKey, Value, ID_FIELD, UPDATED_AT_FIELD};
use chrono::{DateTime, Utc};
use meridian_common::utils::describe_cap;
use meridian_common::{MeridianError, Result, StorageConfig};
use parking_lot::RwLock;

// =============================================================================
// Storage Engine
// =============================================================================

/// Reliable dataset storage.
pub struct StorageEngine<S: BackingStore> {
    store: S,
    config: StorageConfig,
    stats: RwLock<EngineStats>,
}

impl<S: BackingStore> StorageEngine<S> {
    /// Create a storage engine with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, StorageConfig::default())
    }

    /// Create a storage engine with custom configuration.
    pub fn with_config(store: S, config: StorageConfig) -> Self {
        Self {
            store,
            config,
            stats: RwLock::new(EngineStats::default()),
        }
    }

    /// The underlying backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Dataset Management
    // -------------------------------------------------------------------------

    /// Create a dataset. A `cap_size_bytes` of 0 means unbounded.
    pub fn create_dataset(&self, name: &str, cap_size_bytes: u64) -> Result<()> {
        let capped_size = (cap_size_bytes > 0).then_some(cap_size_bytes);
        self.store.create_collection(name, capped_size)?;

        tracing::info!("Created dataset '{}' ({})", name, describe_cap(cap_size_bytes));
        self.stats.write().datasets_created += 1;
        Ok(())
    }

    /// Check whether a dataset exists.
    pub fn dataset_exists(&self, name: &str) -> Result<bool> {
        self.store.collection_exists(name)
    }

    /// Delete every record in a dataset. The dataset and its cap survive.
    /// Emptying a dataset that was never created is `DatasetNotFound`.
    pub fn empty(&self, name: &str) -> Result<()> {
        self.store.clear(name)?;
        tracing::info!("Emptied dataset '{}'", name);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Record Operations
    // -------------------------------------------------------------------------

    /// Upsert a record by its identifier, retrying transient faults.
    ///
    /// A record without `_id` is assigned a fresh object id first, so every
    /// attempt writes the same record under the same key.
    pub fn save(&self, name: &str, mut record: Record) -> Result<RecordKey> {
        let size = record.encoded_size();
        if size > self.config.max_record_size {
            return Err(MeridianError::RecordTooLarge {
                size,
                limit: self.config.max_record_size,
            });
        }

        let key = match record.key() {
            Some(key) => key,
            None if record.id().is_some() => {
                return Err(MeridianError::InvalidId(format!(
                    "_id \"{}\" cannot key a record",
                    record.id().map(Value::stringify).unwrap_or_default()
                )));
            }
            None => {
                let oid = ObjectId::generate();
                record.set(ID_FIELD, oid.clone());
                RecordKey::ObjectId(oid)
            }
        };

        let mut attempts = 0u64;
        let result = retry_transient(self.config.save_attempts, || {
            attempts += 1;
            self.store.save(name, &key, &record)
        });

        let mut stats = self.stats.write();
        stats.save_attempts += attempts;
        match result {
            Ok(()) => {
                stats.records_saved += 1;
                Ok(key)
            }
            Err(err) => {
                stats.save_failures += 1;
                Err(err)
            }
        }
    }

    /// Latest `_updated_at` in the dataset, or `None` when it holds no data.
    pub fn get_last_updated(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let latest = self.store.max_value(name, UPDATED_AT_FIELD)?;
        Ok(latest.as_ref().and_then(Value::as_utc))
    }

    /// Records matching a query, in natural order unless it sorts.
    pub fn find(&self, name: &str, query: &Query) -> Result<Vec<Record>> {
        self.store.find(name, query)
    }

    /// Liveness probe; never fails.
    pub fn alive(&self) -> bool {
        match self.store.ping() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Backing store liveness check failed: {}", err);
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    /// Get engine statistics.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }
}

impl<S: BackingStore> AggregationProvider for StorageEngine<S> {
    fn group(&self, dataset: &str, key: &str, query: &Query) -> Result<Vec<GroupCount>> {
        self.store.group(dataset, key, query)
    }

    fn multi_group(
        &self,
        dataset: &str,
        key: &str,
        subkey: &str,
        query: &Query,
    ) -> Result<Vec<MultiGroupCount>> {
        self.store.multi_group(dataset, key, subkey, query)
    }
}

// =============================================================================
// Engine Statistics
// =============================================================================

/// Statistics for the storage engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub datasets_created: u64,
    pub records_saved: u64,
    pub save_attempts: u64,
    pub save_failures: u64,
}

// =============================================================================
// Tests
// =============================================================================
