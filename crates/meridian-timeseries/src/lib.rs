//! Meridian Time Series - Weekly Aggregation
//!
//! Time-bucketed queries over Meridian datasets. Records are grouped by an
//! arbitrary field, by week, or both; weekly grouped series are gap-filled
//! so every series shares one dense time axis.
//!
//! Key Features:
//! - Flat, grouped, weekly and weekly grouped query shapes
//! - Monday-aligned UTC weekly windows
//! - Gap-filling of grouped weekly series
//! - Dataset facade with validation, derived fields and freshness checks
//!
//! @version 0.1.0
//! @author Meridian Development Team

pub mod period;
pub mod fill;
pub mod query;
pub mod engine;
pub mod dataset;

pub use period::{week_start, weeks_between, Period, PeriodWindow};
pub use fill::{
    amount_to_shift, fill_missing_periods, fill_missing_periods_between, PeriodCell, PeriodGroup,
};
pub use query::{QueryRequest, QueryResult};
pub use engine::AggregationEngine;
pub use dataset::DataSet;
