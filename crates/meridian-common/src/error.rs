//! Meridian Error - Unified Error Types
//!
//! Error handling for all Meridian operations. Every failure keeps its own
//! variant so the outer API layer can map each kind to a distinct client
//! facing code.
//!
//! Key Features:
//! - Record shape violations reported by the validation layer
//! - Dataset lifecycle conflicts (duplicate, missing, not queryable)
//! - Transient backing-store faults, the only retryable kind
//! - User vs system error classification
//!
//! @version 0.1.0
//! @author Meridian Development Team

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all Meridian operations.
#[derive(Error, Debug)]
pub enum MeridianError {
    // Record shape errors
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid timestamp type: {0}")]
    InvalidTimestampType(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("schema validation failed: {}", .0.join(", "))]
    SchemaValidationFailed(Vec<String>),

    #[error("record exceeds maximum size of {limit} bytes ({size} bytes)")]
    RecordTooLarge { size: usize, limit: usize },

    // Dataset errors
    #[error("dataset already exists: {0}")]
    DatasetAlreadyExists(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("dataset is not queryable: {0}")]
    DatasetNotQueryable(String),

    // Backing store errors
    #[error("transient storage fault: {0}")]
    TransientStorageFault(String),

    // Query errors
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("malformed aggregate: {0}")]
    MalformedAggregate(String),

    // Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for Meridian operations.
pub type Result<T> = std::result::Result<T, MeridianError>;

// =============================================================================
// Error Classification
// =============================================================================

impl MeridianError {
    /// Returns true if the operation can be safely retried.
    ///
    /// Only connectivity faults qualify. A duplicate dataset is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MeridianError::TransientStorageFault(_))
    }

    /// Returns true if this is a user error (vs system error).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MeridianError::InvalidKey(_)
                | MeridianError::InvalidValue(_)
                | MeridianError::InvalidTimestampType(_)
                | MeridianError::InvalidId(_)
                | MeridianError::SchemaValidationFailed(_)
                | MeridianError::RecordTooLarge { .. }
                | MeridianError::DatasetAlreadyExists(_)
                | MeridianError::DatasetNotFound(_)
                | MeridianError::DatasetNotQueryable(_)
                | MeridianError::InvalidQuery(_)
        )
    }

    /// Returns true if this error describes a malformed record.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            MeridianError::InvalidKey(_)
                | MeridianError::InvalidValue(_)
                | MeridianError::InvalidTimestampType(_)
                | MeridianError::InvalidId(_)
                | MeridianError::SchemaValidationFailed(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
