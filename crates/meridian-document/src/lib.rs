//! Meridian Document - Reliable Dataset Storage
//!
//! Per-dataset document storage for time-stamped records. Provides the
//! closed record value model, record validation, a filter/sort query model,
//! and the storage engine that keeps ingestion durable under transient
//! backing-store faults.
//!
//! Key Features:
//! - Identifier-keyed upsert with bounded immediate retry
//! - Capped datasets with automatic oldest-record eviction
//! - Liveness and last-update reporting
//! - Pluggable backing store and aggregation provider
//!
//! @version 0.1.0
//! @author Meridian Development Team

pub mod types;
pub mod validation;
pub mod query;
pub mod aggregate;
pub mod collection;
pub mod store;
pub mod retry;
pub mod engine;

pub use types::{ObjectId, Record, RecordKey, Value};
pub use validation::{check_record, validate_record, validate_schema, Schema, ValidationResult};
pub use query::{Filter, Query, QueryBuilder, Sort, SortDirection};
pub use aggregate::{AggregationProvider, GroupCount, MultiGroupCount};
pub use collection::Collection;
pub use store::{BackingStore, MemoryStore};
pub use engine::{EngineStats, StorageEngine};
