//! Meridian Data Set
//!
//! Binds a resolved dataset configuration to the storage and aggregation
//! engines. Ingestion validates each record and stamps the derived fields
//! that updates and weekly queries rely on.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::engine::AggregationEngine;
use crate::period::week_start;
use crate::query::{QueryRequest, QueryResult};
use chrono::{DateTime, Duration, Utc};
use meridian_common::{DatasetConfig, MeridianError, Result};
use meridian_document::types::{UPDATED_AT_FIELD, WEEK_START_AT_FIELD};
use meridian_document::validation::{check_record, check_schema, dataset_name_is_valid};
use meridian_document::{BackingStore, Record, RecordKey, Schema, StorageEngine};
use std::sync::Arc;

// =============================================================================
// Data Set
// =============================================================================

/// A configured dataset.
pub struct DataSet<S: BackingStore> {
    config: DatasetConfig,
    storage: Arc<StorageEngine<S>>,
    engine: AggregationEngine<S>,
    schema: Option<Schema>,
}

impl<S: BackingStore> DataSet<S> {
    pub fn new(storage: Arc<StorageEngine<S>>, config: DatasetConfig) -> Result<Self> {
        if !dataset_name_is_valid(&config.name) {
            return Err(MeridianError::InvalidKey(format!(
                "{} is not a valid dataset name",
                config.name
            )));
        }
        config.validate()?;
        Ok(Self {
            engine: AggregationEngine::new(Arc::clone(&storage)),
            storage,
            config,
            schema: None,
        })
    }

    /// Also validate stored records against `schema`.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Create the backing dataset with the configured cap unless it exists.
    pub fn ensure_created(&self) -> Result<()> {
        if self.storage.dataset_exists(self.name())? {
            return Ok(());
        }
        match self
            .storage
            .create_dataset(self.name(), self.config.cap_size_bytes())
        {
            Err(MeridianError::DatasetAlreadyExists(_)) => Ok(()),
            other => other,
        }
    }

    // -------------------------------------------------------------------------
    // Ingestion
    // -------------------------------------------------------------------------

    /// Validate and save a batch of records. The first failure aborts the
    /// batch; records saved before it stay saved.
    pub fn store(&self, records: Vec<Record>) -> Result<Vec<RecordKey>> {
        self.store_at(records, Utc::now())
    }

    pub fn store_one(&self, record: Record) -> Result<RecordKey> {
        self.store_one_at(record, Utc::now())
    }

    /// Like [`DataSet::store`], stamping `now` as the update time.
    pub fn store_at(&self, records: Vec<Record>, now: DateTime<Utc>) -> Result<Vec<RecordKey>> {
        let count = records.len();
        let keys = records
            .into_iter()
            .map(|record| self.store_one_at(record, now))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Stored {} records in '{}'", count, self.name());
        Ok(keys)
    }

    fn store_one_at(&self, mut record: Record, now: DateTime<Utc>) -> Result<RecordKey> {
        check_record(&record)?;
        if let Some(ref schema) = self.schema {
            check_schema(&record, schema)?;
        }

        record.set(UPDATED_AT_FIELD, now);
        if let Some(timestamp) = record.timestamp() {
            let week = week_start(timestamp.with_timezone(&Utc)).ok_or_else(|| {
                MeridianError::InvalidTimestampType(format!(
                    "_timestamp {} has no representable week",
                    timestamp.to_rfc3339()
                ))
            })?;
            record.set(WEEK_START_AT_FIELD, week);
        }

        self.storage.save(self.name(), record)
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    pub fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        if !self.config.queryable {
            return Err(MeridianError::DatasetNotQueryable(self.name().to_string()));
        }
        self.engine.query(self.name(), request)
    }

    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>> {
        self.storage.get_last_updated(self.name())
    }

    /// Whether the dataset has gone without updates for longer than its
    /// configured maximum age. A dataset with no data is stale; one without
    /// a maximum age never is.
    pub fn is_stale(&self, now: DateTime<Utc>) -> Result<bool> {
        let Some(max_age) = self.config.max_age_expected else {
            return Ok(false);
        };
        let Some(updated_at) = self.last_updated()? else {
            return Ok(true);
        };

        // An age too large to represent is never exceeded.
        Ok(match i64::try_from(max_age).ok().and_then(Duration::try_seconds) {
            Some(max_age) => now.signed_duration_since(updated_at) > max_age,
            None => false,
        })
    }

    pub fn empty(&self) -> Result<()> {
        self.storage.empty(self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================
