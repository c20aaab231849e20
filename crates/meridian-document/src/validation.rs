//! Meridian Document Validation
//!
//! Record shape checks applied before a record reaches the storage engine,
//! and optional per-dataset schema validation.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use crate::types::{Record, Value, END_AT_FIELD, ID_FIELD, START_AT_FIELD, TIMESTAMP_FIELD};
use chrono::{DateTime, FixedOffset};
use meridian_common::{MeridianError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Internal field names a caller may supply.
pub const RESERVED_KEYWORDS: &[&str] = &[TIMESTAMP_FIELD, START_AT_FIELD, END_AT_FIELD, ID_FIELD];

fn valid_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]+$").expect("key pattern compiles"))
}

fn datetime_format_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(?:[+-][0-9]{2}:?[0-9]{2}|Z)")
            .expect("datetime pattern compiles")
    })
}

// =============================================================================
// Validators
// =============================================================================

/// Keys must already be lowercase: `Licence` is rejected rather than folded
/// to `licence` before matching, which is stricter than earlier versions of
/// this check.
pub fn key_is_valid(key: &str) -> bool {
    valid_key_pattern().is_match(key)
}

pub fn key_is_internal(key: &str) -> bool {
    key.starts_with('_')
}

pub fn key_is_reserved(key: &str) -> bool {
    RESERVED_KEYWORDS.contains(&key)
}

/// Dataset names follow the key rules but may not be internal.
pub fn dataset_name_is_valid(name: &str) -> bool {
    key_is_valid(name) && !key_is_internal(name)
}

pub fn value_is_valid(value: &Value) -> bool {
    match value {
        Value::Float(f) => f.is_finite(),
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::String(_)
        | Value::Timestamp(_)
        | Value::ObjectId(_) => true,
    }
}

pub fn value_is_valid_id(value: &Value) -> bool {
    match value {
        Value::ObjectId(_) => true,
        Value::String(s) => !s.is_empty() && !s.chars().any(char::is_whitespace),
        Value::Null
        | Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Timestamp(_) => false,
    }
}

/// Parse an ISO 8601 datetime with an explicit zone (`Z`, `+HH:MM` or `+HHMM`).
pub fn parse_datetime_string(value: &str) -> Option<DateTime<FixedOffset>> {
    if !datetime_format_pattern().is_match(value) {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}

pub fn value_is_valid_datetime_string(value: &str) -> bool {
    parse_datetime_string(value).is_some()
}

// =============================================================================
// Record Validation
// =============================================================================

/// Outcome of record validation, carrying the first violation found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: String::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }
}

fn first_violation(record: &Record) -> Option<MeridianError> {
    for (key, value) in record.iter() {
        if !key_is_valid(key) {
            return Some(MeridianError::InvalidKey(format!("{} is not a valid key", key)));
        }

        if key_is_internal(key) && !key_is_reserved(key) {
            return Some(MeridianError::InvalidKey(format!(
                "{} is not a recognised internal field",
                key
            )));
        }

        if !value_is_valid(value) {
            return Some(MeridianError::InvalidValue(format!("{} has an invalid value", key)));
        }

        let is_timestamp_field = matches!(key.as_str(), TIMESTAMP_FIELD | START_AT_FIELD | END_AT_FIELD);
        if is_timestamp_field && !value.is_timestamp() {
            return Some(MeridianError::InvalidTimestampType(format!(
                "{} is not a valid datetime object",
                key
            )));
        }

        if key == ID_FIELD && !value_is_valid_id(value) {
            return Some(MeridianError::InvalidId(format!(
                "_id \"{}\" is not a valid id",
                value.stringify()
            )));
        }
    }

    None
}

/// Validate a record's keys and values.
pub fn validate_record(record: &Record) -> ValidationResult {
    match first_violation(record) {
        None => ValidationResult::valid(),
        Some(
            MeridianError::InvalidKey(message)
            | MeridianError::InvalidValue(message)
            | MeridianError::InvalidTimestampType(message)
            | MeridianError::InvalidId(message),
        ) => ValidationResult::invalid(message),
        Some(other) => ValidationResult::invalid(other.to_string()),
    }
}

/// Validate a record, reporting the first violation as a typed error.
pub fn check_record(record: &Record) -> Result<()> {
    match first_violation(record) {
        None => Ok(()),
        Some(err) => Err(err),
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Schema definition for record validation.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub fields: HashMap<String, FieldSchema>,
    pub required: Vec<String>,
    pub additional_properties: bool,
}

impl Schema {
    /// Create a new schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: HashMap::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }

    /// Add a field to the schema.
    pub fn field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.insert(name.into(), schema);
        self
    }

    /// Add a field and mark it required.
    pub fn required_field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        let name = name.into();
        self.fields.insert(name.clone(), schema);
        self.required.push(name);
        self
    }

    /// Set whether additional properties are allowed.
    pub fn additional_properties(mut self, allow: bool) -> Self {
        self.additional_properties = allow;
        self
    }

    /// Validate a record against this schema, collecting every violation.
    pub fn validate(&self, record: &Record) -> Vec<String> {
        let mut errors = Vec::new();

        for required in &self.required {
            if !record.contains(required) {
                errors.push(format!("Missing required field: {}", required));
            }
        }

        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();
        for field_name in names {
            if let (Some(value), Some(field_schema)) =
                (record.get(field_name), self.fields.get(field_name))
            {
                if let Err(err) = field_schema.validate(value) {
                    errors.push(format!("Field '{}': {}", field_name, err));
                }
            }
        }

        if !self.additional_properties {
            for key in record.keys() {
                if !self.fields.contains_key(key) && !key_is_internal(key) {
                    errors.push(format!("Unknown field: {}", key));
                }
            }
        }

        errors
    }
}

/// Validate a record against a schema, returning every violation message.
pub fn validate_schema(record: &Record, schema: &Schema) -> Vec<String> {
    schema.validate(record)
}

/// Validate a record against a schema as a typed error.
pub fn check_schema(record: &Record, schema: &Schema) -> Result<()> {
    let errors = schema.validate(record);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(MeridianError::SchemaValidationFailed(errors))
    }
}

// =============================================================================
// Field Schema
// =============================================================================

/// Schema for a single field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub field_type: FieldType,
    pub nullable: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub enum_values: Option<Vec<Value>>,
}

impl FieldSchema {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            nullable: false,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            enum_values: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn int() -> Self {
        Self::new(FieldType::Int)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn bool() -> Self {
        Self::new(FieldType::Bool)
    }

    pub fn timestamp() -> Self {
        Self::new(FieldType::Timestamp)
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn enum_values(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Validate a value against this field schema.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err("Value cannot be null".to_string());
        }

        if !self.field_type.matches(value) {
            return Err(format!(
                "Expected type {:?}, got {}",
                self.field_type,
                value.type_name()
            ));
        }

        if let Some(ref enum_values) = self.enum_values {
            if !enum_values.contains(value) {
                return Err("Value not in allowed enum values".to_string());
            }
        }

        match value {
            Value::Int(_) | Value::Float(_) => {
                let n = value.as_f64().unwrap_or_default();
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("Value {} is less than minimum {}", n, min));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("Value {} is greater than maximum {}", n, max));
                    }
                }
            }
            Value::String(s) => {
                if let Some(min_len) = self.min_length {
                    if s.len() < min_len {
                        return Err(format!(
                            "String length {} is less than minimum {}",
                            s.len(),
                            min_len
                        ));
                    }
                }
                if let Some(max_len) = self.max_length {
                    if s.len() > max_len {
                        return Err(format!(
                            "String length {} is greater than maximum {}",
                            s.len(),
                            max_len
                        ));
                    }
                }
                if let Some(ref pattern) = self.pattern {
                    let re = regex::RegexBuilder::new(pattern)
                        .size_limit(1024 * 1024)
                        .build()
                        .map_err(|e| format!("Invalid regex pattern: {}", e))?;
                    if !re.is_match(s) {
                        return Err(format!("String does not match pattern: {}", pattern));
                    }
                }
            }
            Value::Null | Value::Bool(_) | Value::Timestamp(_) | Value::ObjectId(_) => {}
        }

        Ok(())
    }
}

// =============================================================================
// Field Type
// =============================================================================

/// Type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Number,
    Bool,
    Timestamp,
    ObjectId,
    Any,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Any, _)
                | (Self::String, Value::String(_))
                | (Self::Int, Value::Int(_))
                | (Self::Float, Value::Float(_))
                | (Self::Number, Value::Int(_) | Value::Float(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::Timestamp, Value::Timestamp(_))
                | (Self::ObjectId, Value::ObjectId(_))
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectId;
    use chrono::{TimeZone, Utc};

    fn ts() -> Value {
        Value::from(Utc.with_ymd_and_hms(2013, 4, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_key_rules() {
        assert!(key_is_valid("name"));
        assert!(key_is_valid("_timestamp"));
        assert!(key_is_valid("a1"));
        assert!(!key_is_valid("a"));
        assert!(!key_is_valid("Name"));
        assert!(!key_is_valid("1abc"));
        assert!(!key_is_valid("with-dash"));
        assert!(!key_is_valid(""));

        assert!(key_is_reserved("_id"));
        assert!(!key_is_reserved("_updated_at"));
    }

    #[test]
    fn test_dataset_names() {
        assert!(dataset_name_is_valid("govuk_visitors"));
        assert!(!dataset_name_is_valid("_internal"));
        assert!(!dataset_name_is_valid("Visitors"));
    }

    #[test]
    fn test_id_rules() {
        assert!(value_is_valid_id(&Value::from("abc")));
        assert!(value_is_valid_id(&Value::ObjectId(ObjectId::generate())));
        assert!(!value_is_valid_id(&Value::from("")));
        assert!(!value_is_valid_id(&Value::from("has space")));
        assert!(!value_is_valid_id(&Value::from("tab\there")));
        assert!(!value_is_valid_id(&Value::from(12i64)));
    }

    #[test]
    fn test_datetime_strings() {
        assert!(value_is_valid_datetime_string("2013-04-01T00:00:00Z"));
        assert!(value_is_valid_datetime_string("2013-04-01T00:00:00+01:00"));
        assert!(value_is_valid_datetime_string("2013-04-01T00:00:00-0500"));
        assert!(!value_is_valid_datetime_string("2013-04-01"));
        assert!(!value_is_valid_datetime_string("2013-04-01T00:00:00"));
        assert!(!value_is_valid_datetime_string("2013-02-30T00:00:00Z"));
        assert!(!value_is_valid_datetime_string("not a date"));
    }

    #[test]
    fn test_valid_record() {
        let record = Record::new()
            .with("_id", "first")
            .with("_timestamp", ts())
            .with("count", 4i64)
            .with("name", "licence");
        assert_eq!(validate_record(&record), ValidationResult::valid());
        assert!(check_record(&record).is_ok());
    }

    #[test]
    fn test_invalid_key() {
        let record = Record::new().with("Bad-Key", 1i64);
        let result = validate_record(&record);
        assert!(!result.is_valid);
        assert_eq!(result.message, "Bad-Key is not a valid key");
        assert!(matches!(check_record(&record), Err(MeridianError::InvalidKey(_))));
    }

    #[test]
    fn test_unrecognised_internal_field() {
        let record = Record::new().with("_secret", 1i64);
        assert_eq!(
            validate_record(&record).message,
            "_secret is not a recognised internal field"
        );
    }

    #[test]
    fn test_invalid_value() {
        let record = Record::new().with("ratio", f64::NAN);
        assert!(matches!(check_record(&record), Err(MeridianError::InvalidValue(_))));
    }

    #[test]
    fn test_timestamp_fields_must_be_timestamps() {
        let record = Record::new().with("_timestamp", "2013-04-01T00:00:00Z");
        assert_eq!(
            validate_record(&record).message,
            "_timestamp is not a valid datetime object"
        );

        let record = Record::new().with("_end_at", 3i64);
        assert!(matches!(
            check_record(&record),
            Err(MeridianError::InvalidTimestampType(_))
        ));
    }

    #[test]
    fn test_invalid_id() {
        let record = Record::new().with("_id", "no spaces allowed");
        assert_eq!(
            validate_record(&record).message,
            "_id \"no spaces allowed\" is not a valid id"
        );
        assert!(matches!(check_record(&record), Err(MeridianError::InvalidId(_))));
    }

    #[test]
    fn test_type_validation() {
        let schema = FieldSchema::string();
        assert!(schema.validate(&Value::from("hello")).is_ok());
        assert!(schema.validate(&Value::Int(42)).is_err());

        let schema = FieldSchema::timestamp();
        assert!(schema.validate(&ts()).is_ok());
        assert!(schema.validate(&Value::from("2013-04-01")).is_err());
    }

    #[test]
    fn test_nullable() {
        assert!(FieldSchema::string().validate(&Value::Null).is_err());
        assert!(FieldSchema::string().nullable().validate(&Value::Null).is_ok());
    }

    #[test]
    fn test_range_and_length() {
        let schema = FieldSchema::number().min(0.0).max(100.0);
        assert!(schema.validate(&Value::Int(50)).is_ok());
        assert!(schema.validate(&Value::Float(-0.5)).is_err());
        assert!(schema.validate(&Value::Int(101)).is_err());

        let schema = FieldSchema::string().min_length(3).max_length(10);
        assert!(schema.validate(&Value::from("hello")).is_ok());
        assert!(schema.validate(&Value::from("hi")).is_err());
        assert!(schema.validate(&Value::from("hello world!")).is_err());
    }

    #[test]
    fn test_pattern_and_enum() {
        let schema = FieldSchema::string().pattern(r"^\d{3}-\d{4}$");
        assert!(schema.validate(&Value::from("123-4567")).is_ok());
        assert!(schema.validate(&Value::from("invalid")).is_err());

        let schema = FieldSchema::string().enum_values(vec![Value::from("week"), Value::from("month")]);
        assert!(schema.validate(&Value::from("week")).is_ok());
        assert!(schema.validate(&Value::from("day")).is_err());
    }

    #[test]
    fn test_schema_collects_all_messages() {
        let schema = Schema::new("licensing")
            .required_field("authority", FieldSchema::string().min_length(1))
            .required_field("count", FieldSchema::int().min(0.0))
            .additional_properties(false);

        let record = Record::new()
            .with("_timestamp", ts())
            .with("count", -1i64)
            .with("extra", true);

        let errors = validate_schema(&record, &schema);
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&"Missing required field: authority".to_string()));
        assert!(errors.iter().any(|e| e.starts_with("Field 'count'")));
        assert!(errors.contains(&"Unknown field: extra".to_string()));

        match check_schema(&record, &schema) {
            Err(MeridianError::SchemaValidationFailed(messages)) => assert_eq!(messages, errors),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_schema_accepts_conforming_record() {
        let schema = Schema::new("licensing")
            .required_field("authority", FieldSchema::string())
            .field("count", FieldSchema::int());

        let record = Record::new().with("authority", "westminster").with("count", 3i64);
        assert!(validate_schema(&record, &schema).is_empty());
        assert!(check_schema(&record, &schema).is_ok());
    }
}
