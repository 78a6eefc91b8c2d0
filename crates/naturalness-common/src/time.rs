//! Acquisition time range handling.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NaturalnessError, NaturalnessResult};

/// Default look-back applied when a request omits its start date.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

/// An inclusive range of UTC calendar dates with `start_date < end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl TimeRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> NaturalnessResult<Self> {
        if start_date >= end_date {
            return Err(NaturalnessError::validation(format!(
                "Start date must be before end date (got {} .. {})",
                start_date, end_date
            )));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Build a range ending at `end_date`, starting `lookback_days` earlier when
    /// no explicit start is given.
    pub fn ending_at(
        start_date: Option<NaiveDate>,
        end_date: NaiveDate,
        lookback_days: i64,
    ) -> NaturalnessResult<Self> {
        let start_date = start_date.unwrap_or(end_date - Duration::days(lookback_days));
        Self::new(start_date, end_date)
    }

    /// Whole days between start and end (`end - start`).
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// RFC 3339 interval bounds covering both dates completely.
    pub fn rfc3339_bounds(&self) -> (String, String) {
        (
            format!("{}T00:00:00Z", self.start_date.format("%Y-%m-%d")),
            format!("{}T23:59:59Z", self.end_date.format("%Y-%m-%d")),
        )
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.start_date, self.end_date)
    }
}

/// Time range as supplied by a caller, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeParams {
    /// Lower bound (inclusive) of the acquisition date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Upper bound (inclusive) of the acquisition date. Defaults to today (UTC).
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl TimeRangeParams {
    /// Apply defaults relative to today's UTC date.
    pub fn resolve(&self, lookback_days: i64) -> NaturalnessResult<TimeRange> {
        self.resolve_at(Utc::now().date_naive(), lookback_days)
    }

    /// Apply defaults relative to an explicit `today`.
    pub fn resolve_at(&self, today: NaiveDate, lookback_days: i64) -> NaturalnessResult<TimeRange> {
        let end_date = self.end_date.unwrap_or(today);
        TimeRange::ending_at(self.start_date, end_date, lookback_days)
    }
}
