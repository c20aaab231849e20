//! Meridian Document Query
//!
//! Filter, sort and limit model shared by raw record reads and grouped
//! aggregations.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::types::{Record, Value};
use std::cmp::Ordering;

// =============================================================================
// Query
// =============================================================================

/// A query for filtering records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a record matches every filter of this query.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Add a filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add sorting.
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Add limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply sort then limit to an already filtered list.
    pub fn arrange(&self, records: &mut Vec<Record>) {
        if let Some(ref sort) = self.sort {
            sort.apply(records);
        }
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    Ne { field: String, value: Value },
    Gt { field: String, value: Value },
    Gte { field: String, value: Value },
    Lt { field: String, value: Value },
    Lte { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    Exists { field: String, exists: bool },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Check if a record matches this filter.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Eq { field, value } => record.get(field).map(|v| v == value).unwrap_or(false),
            Self::Ne { field, value } => record.get(field).map(|v| v != value).unwrap_or(true),
            Self::Gt { field, value } => compare_field(record, field, value, |o| o == Ordering::Greater),
            Self::Gte { field, value } => compare_field(record, field, value, |o| o != Ordering::Less),
            Self::Lt { field, value } => compare_field(record, field, value, |o| o == Ordering::Less),
            Self::Lte { field, value } => compare_field(record, field, value, |o| o != Ordering::Greater),
            Self::In { field, values } => record
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Self::Exists { field, exists } => record.contains(field) == *exists,
            Self::And(filters) => filters.iter().all(|f| f.matches(record)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Self::Not(filter) => !filter.matches(record),
        }
    }
}

fn compare_field(record: &Record, field: &str, value: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    record
        .get(field)
        .and_then(|v| compare_values(v, value))
        .map(accept)
        .unwrap_or(false)
}

/// Compare two values of comparable types; mixed types do not compare.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::ObjectId(a), Value::ObjectId(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Rank of a value's type when sorting heterogeneous values.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Int(_) | Value::Float(_) => 1,
        Value::String(_) => 2,
        Value::ObjectId(_) => 3,
        Value::Bool(_) => 4,
        Value::Timestamp(_) => 5,
    }
}

/// Total order used for sorting: missing < null < numbers < strings <
/// object ids < booleans < timestamps.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b)
            .unwrap_or_else(|| type_rank(a).cmp(&type_rank(b))),
    }
}

// =============================================================================
// Sort
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort order for a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Stable sort of records by this field and direction.
    pub fn apply(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            let ordering = sort_order(a.get(&self.field), b.get(&self.field));
            match self.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
}

// =============================================================================
// Query Builder
// =============================================================================

/// Builder for constructing queries.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter::eq(field, value));
        self
    }

    pub fn ne(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter::Ne {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn gt(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter::Gt {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter::gte(field, value));
        self
    }

    pub fn lt(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter::lt(field, value));
        self
    }

    pub fn lte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filters.push(Filter::Lte {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn in_values(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.query.filters.push(Filter::In {
            field: field.into(),
            values,
        });
        self
    }

    pub fn exists(mut self, field: impl Into<String>, exists: bool) -> Self {
        self.query.filters.push(Filter::Exists {
            field: field.into(),
            exists,
        });
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.query.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn create_test_record() -> Record {
        Record::new()
            .with("name", "Alice")
            .with("age", 30i64)
            .with("active", true)
            .with("_timestamp", Utc.with_ymd_and_hms(2013, 4, 3, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_eq_filter() {
        let record = create_test_record();
        assert!(Filter::eq("name", "Alice").matches(&record));
        assert!(!Filter::eq("name", "Bob").matches(&record));
        assert!(!Filter::eq("missing", "Alice").matches(&record));
    }

    #[test]
    fn test_comparison_filters() {
        let record = create_test_record();

        let query = QueryBuilder::new().gt("age", 25i64).lte("age", 30i64).build();
        assert!(query.matches(&record));

        let query = QueryBuilder::new().lt("age", 25i64).build();
        assert!(!query.matches(&record));

        let query = QueryBuilder::new().gt("age", "25").build();
        assert!(!query.matches(&record));
    }

    #[test]
    fn test_timestamp_range() {
        let record = create_test_record();
        let query = QueryBuilder::new()
            .gte("_timestamp", Utc.with_ymd_and_hms(2013, 4, 1, 0, 0, 0).unwrap())
            .lt("_timestamp", Utc.with_ymd_and_hms(2013, 4, 8, 0, 0, 0).unwrap())
            .build();
        assert!(query.matches(&record));

        let query = QueryBuilder::new()
            .lt("_timestamp", Utc.with_ymd_and_hms(2013, 4, 3, 12, 0, 0).unwrap())
            .build();
        assert!(!query.matches(&record));
    }

    #[test]
    fn test_logical_filters() {
        let record = create_test_record();

        let filter = Filter::And(vec![Filter::eq("name", "Alice"), Filter::eq("active", true)]);
        assert!(filter.matches(&record));

        let filter = Filter::Or(vec![Filter::eq("name", "Bob"), Filter::eq("active", true)]);
        assert!(filter.matches(&record));

        let filter = Filter::Not(Box::new(Filter::eq("name", "Alice")));
        assert!(!filter.matches(&record));
    }

    #[test]
    fn test_in_and_exists() {
        let record = create_test_record();
        let query = QueryBuilder::new()
            .in_values("name", vec![Value::from("Alice"), Value::from("Bob")])
            .exists("age", true)
            .exists("email", false)
            .ne("name", "Carol")
            .build();
        assert!(query.matches(&record));
    }

    #[test]
    fn test_sort_and_limit() {
        let mut records = vec![
            Record::new().with("n", 2i64),
            Record::new(),
            Record::new().with("n", 3i64),
            Record::new().with("n", 1i64),
        ];

        let query = Query::new().with_sort(Sort::descending("n")).with_limit(2);
        query.arrange(&mut records);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("n"), Some(&Value::Int(3)));
        assert_eq!(records[1].get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_sort_places_missing_first() {
        let mut records = vec![Record::new().with("n", 1i64), Record::new()];
        Sort::ascending("n").apply(&mut records);
        assert!(records[0].get("n").is_none());
    }

    #[test]
    fn test_mixed_type_sort_order() {
        assert_eq!(
            sort_order(Some(&Value::from(10i64)), Some(&Value::from("a"))),
            Ordering::Less
        );
        assert_eq!(
            sort_order(Some(&Value::Null), Some(&Value::from(false))),
            Ordering::Less
        );
    }
}
