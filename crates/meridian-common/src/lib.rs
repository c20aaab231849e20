//! Meridian Common - Shared Types and Utilities
//!
//! Foundational types shared by the Meridian storage and aggregation crates.
//! Provides the error taxonomy every layer reports through, the resolved
//! configuration types callers hand to the engines, and small helpers.
//!
//! Key Features:
//! - Unified error type with retryable error detection
//! - Storage and dataset configuration loadable from TOML
//! - Human-readable size formatting for diagnostics
//!
//! @version 0.1.0
//! @author Meridian Development Team

pub mod config;
pub mod error;
pub mod utils;

pub use config::{DatasetConfig, MeridianConfig, StorageConfig};
pub use error::{MeridianError, Result};
