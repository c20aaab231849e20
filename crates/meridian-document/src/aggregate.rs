//! Meridian Aggregation Provider
//!
//! The grouping capability a backing store offers to the aggregation
//! engine: a single-level grouped count and a two-level grouped count.
//! Nothing above this seam depends on how a store evaluates them.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::query::{sort_order, Query, SortDirection};
use crate::types::{Record, Value, COUNT_FIELD};
use meridian_common::Result;
use std::cmp::Ordering;
use std::collections::HashMap;

// =============================================================================
// Group Results
// =============================================================================

/// Count of records sharing one value of a grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    pub value: Value,
    pub count: u64,
}

/// Count of records sharing one value of a key, split by a second key.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGroupCount {
    pub value: Value,
    pub count: u64,
    pub subgroups: Vec<GroupCount>,
}

impl GroupCount {
    /// Render as `{key: value, _count: n}`.
    pub fn to_record(&self, key: &str) -> Record {
        Record::new()
            .with(key, self.value.clone())
            .with(COUNT_FIELD, self.count as i64)
    }
}

// =============================================================================
// Aggregation Provider
// =============================================================================

/// Grouped counting over the records of a dataset.
///
/// `query` filters the records; its sort applies to the emitted groups,
/// whose only fields are the grouping key and `_count`; its limit caps the
/// number of (outer) groups. Records without the key are not counted.
pub trait AggregationProvider {
    fn group(&self, dataset: &str, key: &str, query: &Query) -> Result<Vec<GroupCount>>;

    fn multi_group(
        &self,
        dataset: &str,
        key: &str,
        subkey: &str,
        query: &Query,
    ) -> Result<Vec<MultiGroupCount>>;
}

// =============================================================================
// In-process evaluation
// =============================================================================

/// Hashable identity of a value for bucketing.
///
/// Numbers bucket by numeric value, so `1`, `1.0` and `-0.0`/`0` share a
/// group. Timestamps bucket by instant.
fn bucket_key(value: &Value) -> (&'static str, String) {
    const I64_RANGE: std::ops::Range<f64> = (i64::MIN as f64)..(i64::MAX as f64);

    match value {
        Value::Int(n) => ("integral", n.to_string()),
        Value::Float(f) if f.fract() == 0.0 && I64_RANGE.contains(f) => {
            ("integral", (*f as i64).to_string())
        }
        Value::Float(f) => ("float", f.to_bits().to_string()),
        other => (other.type_name(), other.to_utc().stringify()),
    }
}

/// Group already filtered records by `key`, in first-seen order.
pub fn group_records<'a, I>(records: I, key: &str) -> Vec<GroupCount>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut positions: HashMap<(&'static str, String), usize> = HashMap::new();
    let mut groups: Vec<GroupCount> = Vec::new();

    for record in records {
        let Some(value) = record.get(key) else {
            continue;
        };
        let position = *positions.entry(bucket_key(value)).or_insert_with(|| {
            groups.push(GroupCount {
                value: value.clone(),
                count: 0,
            });
            groups.len() - 1
        });
        groups[position].count += 1;
    }

    groups
}

/// Group already filtered records by `key`, then by `subkey` within each group.
pub fn multi_group_records<'a, I>(records: I, key: &str, subkey: &str) -> Vec<MultiGroupCount>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut positions: HashMap<(&'static str, String), usize> = HashMap::new();
    let mut members: Vec<(Value, Vec<&'a Record>)> = Vec::new();

    for record in records {
        let (Some(value), true) = (record.get(key), record.contains(subkey)) else {
            continue;
        };
        let position = *positions.entry(bucket_key(value)).or_insert_with(|| {
            members.push((value.clone(), Vec::new()));
            members.len() - 1
        });
        members[position].1.push(record);
    }

    members
        .into_iter()
        .map(|(value, records)| MultiGroupCount {
            value,
            count: records.len() as u64,
            subgroups: group_records(records, subkey),
        })
        .collect()
}

fn compare_groups(
    key: &str,
    sort_field: &str,
    a: (&Value, u64),
    b: (&Value, u64),
) -> Ordering {
    if sort_field == COUNT_FIELD {
        a.1.cmp(&b.1)
    } else if sort_field == key {
        sort_order(Some(a.0), Some(b.0))
    } else {
        Ordering::Equal
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Apply a query's sort and limit to single-level groups.
pub fn arrange_groups(groups: &mut Vec<GroupCount>, key: &str, query: &Query) {
    if let Some(ref sort) = query.sort {
        groups.sort_by(|a, b| {
            directed(
                compare_groups(key, &sort.field, (&a.value, a.count), (&b.value, b.count)),
                sort.direction,
            )
        });
    }
    if let Some(limit) = query.limit {
        groups.truncate(limit);
    }
}

/// Apply a query's sort and limit to two-level groups.
pub fn arrange_multi_groups(groups: &mut Vec<MultiGroupCount>, key: &str, query: &Query) {
    if let Some(ref sort) = query.sort {
        groups.sort_by(|a, b| {
            directed(
                compare_groups(key, &sort.field, (&a.value, a.count), (&b.value, b.count)),
                sort.direction,
            )
        });
    }
    if let Some(limit) = query.limit {
        groups.truncate(limit);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Sort;

    fn records() -> Vec<Record> {
        vec![
            Record::new().with("authority", "westminster").with("licence", "food"),
            Record::new().with("authority", "camden").with("licence", "food"),
            Record::new().with("authority", "westminster").with("licence", "street"),
            Record::new().with("licence", "food"),
            Record::new().with("authority", "westminster").with("licence", "food"),
        ]
    }

    #[test]
    fn test_group_counts_in_first_seen_order() {
        let records = records();
        let groups = group_records(&records, "authority");

        assert_eq!(
            groups,
            vec![
                GroupCount { value: Value::from("westminster"), count: 3 },
                GroupCount { value: Value::from("camden"), count: 1 },
            ]
        );
    }

    #[test]
    fn test_numerically_equal_values_share_a_group() {
        let records = vec![
            Record::new().with("n", 1),
            Record::new().with("n", 1.0),
            Record::new().with("n", 0.0),
            Record::new().with("n", -0.0),
            Record::new().with("n", 0),
            Record::new().with("n", 1.5),
            Record::new().with("n", "1"),
        ];

        let groups = group_records(&records, "n");
        let counts: Vec<(Value, u64)> = groups.into_iter().map(|g| (g.value, g.count)).collect();

        assert_eq!(
            counts,
            vec![
                (Value::Int(1), 2),
                (Value::Float(0.0), 3),
                (Value::Float(1.5), 1),
                (Value::from("1"), 1),
            ]
        );
    }

    #[test]
    fn test_multi_group() {
        let records = records();
        let groups = multi_group_records(&records, "authority", "licence");

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].value, Value::from("westminster"));
        assert_eq!(groups[0].count, 3);
        assert_eq!(
            groups[0].subgroups,
            vec![
                GroupCount { value: Value::from("food"), count: 2 },
                GroupCount { value: Value::from("street"), count: 1 },
            ]
        );
        assert_eq!(groups[1].subgroups.len(), 1);
    }

    #[test]
    fn test_arrange_by_count_descending_with_limit() {
        let records = records();
        let mut groups = group_records(&records, "licence");
        let query = Query::new().with_sort(Sort::descending("_count")).with_limit(1);
        arrange_groups(&mut groups, "licence", &query);

        assert_eq!(groups, vec![GroupCount { value: Value::from("food"), count: 4 }]);
    }

    #[test]
    fn test_arrange_by_key() {
        let records = records();
        let mut groups = multi_group_records(&records, "authority", "licence");
        let query = Query::new().with_sort(Sort::ascending("authority"));
        arrange_multi_groups(&mut groups, "authority", &query);

        assert_eq!(groups[0].value, Value::from("camden"));
    }

    #[test]
    fn test_group_record_rendering() {
        let group = GroupCount { value: Value::from("food"), count: 4 };
        let record = group.to_record("licence");
        assert_eq!(record.get("licence"), Some(&Value::from("food")));
        assert_eq!(record.get("_count"), Some(&Value::Int(4)));
    }
}
