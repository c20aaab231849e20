//! Meridian Time Series Periods
//!
//! Weekly bucketing: truncation of timestamps to the start of their week and
//! the fixed seven day windows built from it.
//!
//! @version 0.1.0
//! @author Meridian Development Team

use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, TimeZone, Utc};
use meridian_common::{MeridianError, Result};
use meridian_document::types::WEEK_START_AT_FIELD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Period
// =============================================================================

/// Bucketing period for time-series queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
}

impl Period {
    /// Length of one window.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Week => Duration::days(7),
        }
    }

    /// Start of the window containing `timestamp`, if representable.
    pub fn truncate(&self, timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Week => week_start(timestamp),
        }
    }

    /// Stored field holding each record's truncated timestamp.
    pub fn bucket_field(&self) -> &'static str {
        match self {
            Self::Week => WEEK_START_AT_FIELD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Week => "week",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Period {
    type Err = MeridianError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "week" => Ok(Self::Week),
            other => Err(MeridianError::InvalidQuery(format!("unsupported period: {}", other))),
        }
    }
}

/// Monday 00:00:00 UTC of the week containing `timestamp`.
///
/// `None` when that Monday falls before the earliest representable date.
pub fn week_start(timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = timestamp.date_naive();
    let monday = date.checked_sub_days(Days::new(u64::from(
        date.weekday().num_days_from_monday(),
    )))?;
    Some(Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN)))
}

// =============================================================================
// Period Window
// =============================================================================

/// A seven day window. Windows order by start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodWindow {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl PeriodWindow {
    /// The week starting exactly at `start_at`, unless its end falls past
    /// the latest representable instant.
    pub fn week_starting(start_at: DateTime<Utc>) -> Option<Self> {
        let end_at = start_at.checked_add_signed(Period::Week.duration())?;
        Some(Self { start_at, end_at })
    }

    /// The week containing `timestamp`.
    pub fn containing(timestamp: DateTime<Utc>) -> Option<Self> {
        week_start(timestamp).and_then(Self::week_starting)
    }

    /// The window immediately after this one.
    pub fn next(&self) -> Option<Self> {
        Self::week_starting(self.end_at)
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start_at <= timestamp && timestamp < self.end_at
    }
}

/// Every weekly window whose start lies in `[week_start(start), end)`.
///
/// Stops early at the edge of the representable range.
pub fn weeks_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<PeriodWindow> {
    let mut windows = Vec::new();
    let mut next = PeriodWindow::containing(start);
    while let Some(window) = next.filter(|w| w.start_at < end) {
        windows.push(window);
        next = window.next();
    }
    windows
}

// =============================================================================
// Tests
// =============================================================================
