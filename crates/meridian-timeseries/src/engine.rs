//! Meridian Aggregation Engine
//!
//! Answers dataset queries on top of the storage engine. Requests are
//! dispatched to one of four shapes depending on `group_by` and `period`:
//! flat record queries, grouped counts, weekly counts, and weekly counts per
//! group. Weekly grouped series are densified onto a shared axis.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::fill::{fill_missing_periods, PeriodCell, PeriodGroup};
use crate::period::{Period, PeriodWindow};
use crate::query::{QueryRequest, QueryResult};
use chrono::{DateTime, Utc};
use meridian_common::{MeridianError, Result};
use meridian_document::types::{ID_FIELD, TIMESTAMP_FIELD};
use meridian_document::{AggregationProvider, BackingStore, GroupCount, Record, StorageEngine, Value};
use std::sync::Arc;

// =============================================================================
// Aggregation Engine
// =============================================================================

/// Read-only query execution over a storage engine.
pub struct AggregationEngine<S: BackingStore> {
    storage: Arc<StorageEngine<S>>,
}

impl<S: BackingStore> Clone for AggregationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: BackingStore> AggregationEngine<S> {
    pub fn new(storage: Arc<StorageEngine<S>>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<StorageEngine<S>> {
        &self.storage
    }

    /// Run a query against `dataset`.
    pub fn query(&self, dataset: &str, request: &QueryRequest) -> Result<QueryResult> {
        request.validate()?;

        match (request.group_by.as_deref(), request.period) {
            (Some(key), Some(period)) => {
                tracing::debug!("Weekly grouped query on '{}' by '{}'", dataset, key);
                self.execute_weekly_group_query(dataset, key, period, request)
            }
            (Some(key), None) => {
                tracing::debug!("Grouped query on '{}' by '{}'", dataset, key);
                self.execute_grouped_query(dataset, key, request)
            }
            (None, Some(period)) => {
                tracing::debug!("Period query on '{}' by {}", dataset, period);
                self.execute_period_query(dataset, period, request)
            }
            (None, None) => {
                tracing::debug!("Flat query on '{}'", dataset);
                self.execute_query(dataset, request)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Query Shapes
    // -------------------------------------------------------------------------

    fn execute_query(&self, dataset: &str, request: &QueryRequest) -> Result<QueryResult> {
        let records = self.storage.find(dataset, &request.to_query())?;
        Ok(QueryResult::Records(
            records.into_iter().map(normalize_record).collect(),
        ))
    }

    fn execute_grouped_query(
        &self,
        dataset: &str,
        key: &str,
        request: &QueryRequest,
    ) -> Result<QueryResult> {
        let groups = self.storage.group(dataset, key, &request.to_query())?;
        Ok(QueryResult::Grouped {
            key: key.to_string(),
            groups,
        })
    }

    /// Weeks are returned in natural order, without gap-filling. Sorting is
    /// not applied to this shape.
    fn execute_period_query(
        &self,
        dataset: &str,
        period: Period,
        request: &QueryRequest,
    ) -> Result<QueryResult> {
        let mut query = request.to_query();
        query.sort = None;

        let groups = self.storage.group(dataset, period.bucket_field(), &query)?;
        let cells = groups
            .iter()
            .map(|group| period_cell(period, group))
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryResult::Periods(cells))
    }

    fn execute_weekly_group_query(
        &self,
        dataset: &str,
        key: &str,
        period: Period,
        request: &QueryRequest,
    ) -> Result<QueryResult> {
        let results = self.storage.multi_group(
            dataset,
            key,
            period.bucket_field(),
            &request.to_query(),
        )?;

        let mut groups = Vec::with_capacity(results.len());
        for result in results {
            let mut cells = result
                .subgroups
                .iter()
                .map(|subgroup| period_cell(period, subgroup))
                .collect::<Result<Vec<_>>>()?;
            cells.sort_by_key(|cell| cell.window.start_at);
            groups.push(PeriodGroup::new(result.value, cells));
        }

        let added = fill_missing_periods(&mut groups);
        if added > 0 {
            tracing::debug!("Filled {} empty weeks across {} groups", added, groups.len());
        }

        Ok(QueryResult::PeriodGrouped {
            key: key.to_string(),
            groups,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn period_cell(period: Period, group: &GroupCount) -> Result<PeriodCell> {
    let start_at: DateTime<Utc> = group.value.as_utc().ok_or_else(|| {
        MeridianError::MalformedAggregate(format!(
            "{} bucket holds a {}, expected a timestamp",
            period.bucket_field(),
            group.value.type_name()
        ))
    })?;
    let window = PeriodWindow::week_starting(start_at).ok_or_else(|| {
        MeridianError::MalformedAggregate(format!(
            "{} bucket {} has no representable end",
            period.bucket_field(),
            start_at.to_rfc3339()
        ))
    })?;
    Ok(PeriodCell::new(window, group.count))
}

/// Stringify `_id` and express `_timestamp` in UTC.
fn normalize_record(mut record: Record) -> Record {
    if let Some(id) = record.id().map(Value::stringify) {
        record.set(ID_FIELD, id);
    }
    if let Some(timestamp) = record.get(TIMESTAMP_FIELD).map(Value::to_utc) {
        record.set(TIMESTAMP_FIELD, timestamp);
    }
    record
}

// =============================================================================
// Tests
// =============================================================================
