//! Meridian Document Types
//!
//! Core data types for record storage: the closed value model, opaque
//! identifiers and the record mapping itself, plus their JSON boundary.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use chrono::{DateTime, FixedOffset, Utc};
use meridian_common::{MeridianError, Result};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier field.
pub const ID_FIELD: &str = "_id";
/// Primary event timestamp.
pub const TIMESTAMP_FIELD: &str = "_timestamp";
pub const START_AT_FIELD: &str = "_start_at";
pub const END_AT_FIELD: &str = "_end_at";
/// Update marker stamped on ingestion.
pub const UPDATED_AT_FIELD: &str = "_updated_at";
/// Weekly truncation of `_timestamp`, stamped on ingestion.
pub const WEEK_START_AT_FIELD: &str = "_week_start_at";
/// Count field emitted by grouped aggregations.
pub const COUNT_FIELD: &str = "_count";

// =============================================================================
// Object ID
// =============================================================================

/// Opaque identifier assigned by the backing store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(String);

static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh 24 hex digit identifier, unique within the process.
    pub fn generate() -> Self {
        let now = Utc::now();
        let seconds = now.timestamp() as u32;
        let sequence = OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mixed = (u64::from(now.timestamp_subsec_nanos()) << 32)
            .wrapping_mul(0x5851_f42d_4c95_7f2d)
            ^ sequence;
        Self(format!("{:08x}{:016x}", seconds, mixed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A record value. The set of variants is closed: anything else a caller
/// hands in is rejected at the JSON boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<FixedOffset>),
    ObjectId(ObjectId),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, Self::Timestamp(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Timestamp normalized to UTC.
    pub fn as_utc(&self) -> Option<DateTime<Utc>> {
        self.as_timestamp().map(|ts| ts.with_timezone(&Utc))
    }

    /// Name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::ObjectId(_) => "object id",
        }
    }

    /// Portable string form of an identifier value.
    pub fn stringify(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::Timestamp(ts) => ts.to_rfc3339(),
            Self::ObjectId(oid) => oid.to_string(),
        }
    }

    /// Same instant re-expressed with a zero UTC offset; other variants unchanged.
    pub fn to_utc(&self) -> Value {
        match self {
            Self::Timestamp(ts) => Self::Timestamp(ts.with_timezone(&Utc).fixed_offset()),
            other => other.clone(),
        }
    }

    /// Convert from serde_json::Value.
    ///
    /// Arrays and objects other than `{"$oid": "..."}` have no counterpart
    /// in the value model and yield `None`.
    pub fn from_json(json: &JsonValue) -> Option<Self> {
        match json {
            JsonValue::Null => Some(Self::Null),
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            JsonValue::String(s) => Some(Self::String(s.clone())),
            JsonValue::Object(obj) if obj.len() == 1 => obj
                .get("$oid")
                .and_then(|v| v.as_str())
                .map(|s| Self::ObjectId(ObjectId::new(s))),
            JsonValue::Object(_) | JsonValue::Array(_) => None,
        }
    }

    /// Convert to serde_json::Value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(n) => JsonValue::Number((*n).into()),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
            Self::ObjectId(oid) => serde_json::json!({ "$oid": oid.as_str() }),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts.fixed_offset())
    }
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Self::ObjectId(oid)
    }
}

// =============================================================================
// Record Key
// =============================================================================

/// Identifier a record is upserted under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    String(String),
    ObjectId(ObjectId),
}

impl RecordKey {
    /// Key for an identifier value; only strings and object ids qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::ObjectId(oid) => Some(Self::ObjectId(oid.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::ObjectId(oid) => write!(f, "ObjectId({})", oid),
        }
    }
}

// =============================================================================
// Record
// =============================================================================

/// A record: a mapping of field name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    data: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a field value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Check if a field exists.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn id(&self) -> Option<&Value> {
        self.get(ID_FIELD)
    }

    /// Upsert key derived from `_id`, if the record carries a usable one.
    pub fn key(&self) -> Option<RecordKey> {
        self.id().and_then(RecordKey::from_value)
    }

    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.get(TIMESTAMP_FIELD).and_then(Value::as_timestamp)
    }

    /// Create a record from a JSON object.
    ///
    /// RFC 3339 strings under the reserved timestamp keys are decoded into
    /// timestamps; anything that does not parse is left as a string for the
    /// validator to reject.
    pub fn from_json(json: &JsonValue) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| MeridianError::InvalidValue("record must be a JSON object".into()))?;

        let mut record = Self::new();
        for (key, raw) in obj {
            let value = Value::from_json(raw)
                .ok_or_else(|| MeridianError::InvalidValue(format!("{} has an invalid value", key)))?;
            let value = match (key.as_str(), value) {
                (TIMESTAMP_FIELD | START_AT_FIELD | END_AT_FIELD, Value::String(s)) => {
                    match DateTime::parse_from_rfc3339(&s) {
                        Ok(ts) => Value::Timestamp(ts),
                        Err(_) => Value::String(s),
                    }
                }
                (_, value) => value,
            };
            record.data.insert(key.clone(), value);
        }
        Ok(record)
    }

    /// Parse a record from JSON text, as received in a write payload.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: JsonValue =
            serde_json::from_str(text).map_err(|e| MeridianError::Serialization(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Convert to JSON.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Size of the record's JSON encoding in bytes.
    pub fn encoded_size(&self) -> usize {
        serde_json::to_vec(&self.to_json())
            .map(|bytes| bytes.len())
            .unwrap_or(0)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
