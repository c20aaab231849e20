//! Meridian Document Collection
//!
//! A single dataset's records held in insertion order, with identifier
//! keyed upsert and optional size capping.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::aggregate::{arrange_groups, arrange_multi_groups, group_records, multi_group_records};
use crate::aggregate::{GroupCount, MultiGroupCount};
use crate::query::{sort_order, Query};
use crate::types::{Record, RecordKey, Value};
use std::collections::{HashMap, VecDeque};

// =============================================================================
// Collection
// =============================================================================

struct StoredRecord {
    record: Record,
    size: u64,
}

/// A collection of records.
pub struct Collection {
    name: String,
    cap_size: Option<u64>,
    records: HashMap<RecordKey, StoredRecord>,
    order: VecDeque<RecordKey>,
    size_bytes: u64,
}

impl Collection {
    /// Create an unbounded collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cap_size: None,
            records: HashMap::new(),
            order: VecDeque::new(),
            size_bytes: 0,
        }
    }

    /// Create a collection that evicts its oldest records past `cap_size` bytes.
    pub fn capped(name: impl Into<String>, cap_size: u64) -> Self {
        Self {
            cap_size: Some(cap_size),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_capped(&self) -> bool {
        self.cap_size.is_some()
    }

    pub fn cap_size(&self) -> Option<u64> {
        self.cap_size
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    // -------------------------------------------------------------------------
    // Record Operations
    // -------------------------------------------------------------------------

    /// Insert or overwrite the record stored under `key`.
    ///
    /// An overwrite keeps the record's original position in natural order.
    /// Returns the number of records evicted to honour the cap.
    pub fn upsert(&mut self, key: RecordKey, record: Record) -> usize {
        let size = record.encoded_size() as u64;

        match self.records.get_mut(&key) {
            Some(existing) => {
                self.size_bytes = self.size_bytes - existing.size + size;
                *existing = StoredRecord { record, size };
            }
            None => {
                self.size_bytes += size;
                self.order.push_back(key.clone());
                self.records.insert(key, StoredRecord { record, size });
            }
        }

        self.evict()
    }

    fn evict(&mut self) -> usize {
        let Some(cap) = self.cap_size else {
            return 0;
        };

        let mut evicted = 0;
        while self.size_bytes > cap && self.order.len() > 1 {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(stored) = self.records.remove(&oldest) {
                self.size_bytes -= stored.size;
                evicted += 1;
            }
        }
        evicted
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key).map(|stored| &stored.record)
    }

    /// Records in natural (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order
            .iter()
            .filter_map(|key| self.records.get(key).map(|stored| &stored.record))
    }

    /// Remove every record; the cap survives.
    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
        self.size_bytes = 0;
    }

    // -------------------------------------------------------------------------
    // Query Operations
    // -------------------------------------------------------------------------

    /// Records matching a query, sorted and limited as it asks.
    pub fn find(&self, query: &Query) -> Vec<Record> {
        let mut matching: Vec<Record> = self
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        query.arrange(&mut matching);
        matching
    }

    /// Largest value stored under `field`, if any record has it.
    pub fn max_value(&self, field: &str) -> Option<Value> {
        self.iter()
            .filter_map(|record| record.get(field))
            .max_by(|a, b| sort_order(Some(a), Some(b)))
            .cloned()
    }

    pub fn group(&self, key: &str, query: &Query) -> Vec<GroupCount> {
        let mut groups = group_records(self.iter().filter(|r| query.matches(r)), key);
        arrange_groups(&mut groups, key, query);
        groups
    }

    pub fn multi_group(&self, key: &str, subkey: &str, query: &Query) -> Vec<MultiGroupCount> {
        let mut groups =
            multi_group_records(self.iter().filter(|r| query.matches(r)), key, subkey);
        arrange_multi_groups(&mut groups, key, query);
        groups
    }
}

// =============================================================================
// Tests
// =============================================================================
