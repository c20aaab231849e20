//! Meridian Time Series Query
//!
//! Query requests against a dataset and the four result shapes they produce.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::fill::{PeriodCell, PeriodGroup};
use crate::period::Period;
use chrono::{DateTime, Utc};
use meridian_common::{MeridianError, Result};
use meridian_document::types::{COUNT_FIELD, END_AT_FIELD, START_AT_FIELD, TIMESTAMP_FIELD};
use meridian_document::validation::key_is_valid;
use meridian_document::{Filter, GroupCount, Query, Record, Sort, Value};
use serde_json::{json, Map, Value as JsonValue};

// =============================================================================
// Query Request
// =============================================================================

/// A query against one dataset.
///
/// Which of the four query shapes runs depends on whether `group_by` and
/// `period` are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub filters: Vec<Filter>,
    pub filter_by: Vec<(String, Value)>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
    pub group_by: Option<String>,
    pub period: Option<Period>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Require `field` to equal `value`.
    pub fn filter_by(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_by.push((field.into(), value.into()));
        self
    }

    /// Only records with `_timestamp` at or after `start_at`.
    pub fn starting_at(mut self, start_at: DateTime<Utc>) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Only records with `_timestamp` strictly before `end_at`.
    pub fn ending_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn group_by(mut self, key: impl Into<String>) -> Self {
        self.group_by = Some(key.into());
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    /// Reject requests no query shape can answer.
    pub fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(MeridianError::InvalidQuery("limit must be positive".into()));
        }
        if let Some(ref key) = self.group_by {
            if !key_is_valid(key) {
                return Err(MeridianError::InvalidQuery(format!(
                    "{} is not a valid group_by key",
                    key
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
            if start > end {
                return Err(MeridianError::InvalidQuery(
                    "start_at must not be after end_at".into(),
                ));
            }
        }
        Ok(())
    }

    /// Lower the request onto a storage query.
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        for filter in &self.filters {
            query = query.with_filter(filter.clone());
        }
        for (field, value) in &self.filter_by {
            query = query.with_filter(Filter::eq(field.clone(), value.clone()));
        }
        if let Some(start_at) = self.start_at {
            query = query.with_filter(Filter::gte(TIMESTAMP_FIELD, start_at));
        }
        if let Some(end_at) = self.end_at {
            query = query.with_filter(Filter::lt(TIMESTAMP_FIELD, end_at));
        }
        if let Some(ref sort) = self.sort {
            query = query.with_sort(sort.clone());
        }
        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        query
    }
}

// =============================================================================
// Query Result
// =============================================================================

/// Result of a dataset query, one variant per query shape.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Matching records.
    Records(Vec<Record>),
    /// One count per distinct value of `key`.
    Grouped { key: String, groups: Vec<GroupCount> },
    /// One count per week that has data.
    Periods(Vec<PeriodCell>),
    /// Weekly counts per distinct value of `key`, on a shared axis.
    PeriodGrouped { key: String, groups: Vec<PeriodGroup> },
}

impl QueryResult {
    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Grouped { groups, .. } => groups.len(),
            Self::Periods(cells) => cells.len(),
            Self::PeriodGrouped { groups, .. } => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render as a JSON array of mappings.
    pub fn to_json(&self) -> JsonValue {
        let entries: Vec<JsonValue> = match self {
            Self::Records(records) => records.iter().map(Record::to_json).collect(),
            Self::Grouped { key, groups } => groups
                .iter()
                .map(|group| group.to_record(key).to_json())
                .collect(),
            Self::Periods(cells) => cells.iter().map(cell_to_json).collect(),
            Self::PeriodGrouped { key, groups } => groups
                .iter()
                .map(|group| {
                    let mut entry = Map::new();
                    entry.insert(key.clone(), group.value.to_json());
                    entry.insert(
                        "values".to_string(),
                        JsonValue::Array(group.cells.iter().map(cell_to_json).collect()),
                    );
                    JsonValue::Object(entry)
                })
                .collect(),
        };
        JsonValue::Array(entries)
    }
}

fn cell_to_json(cell: &PeriodCell) -> JsonValue {
    let mut entry = Map::new();
    entry.insert(
        START_AT_FIELD.to_string(),
        JsonValue::String(cell.window.start_at.to_rfc3339()),
    );
    entry.insert(
        END_AT_FIELD.to_string(),
        JsonValue::String(cell.window.end_at.to_rfc3339()),
    );
    entry.insert(COUNT_FIELD.to_string(), json!(cell.count));
    JsonValue::Object(entry)
}

// =============================================================================
// Tests
// =============================================================================
