//! Relative-time labels for case timestamps.
//!
//! The delta is `when - now`, so deadlines in the future are positive and
//! past timestamps keep their negative sign on the same unit ladder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const SECONDS_LIMIT: i64 = 180;
const MINUTES_LIMIT: i64 = 60;
const HOURS_LIMIT: i64 = 24;
const DAYS_LIMIT: i64 = 60;
const WEEKS_LIMIT: i64 = 20;
const WEEKS_PER_MONTH: f64 = 4.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

impl TimeUnit {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeTime {
    pub magnitude: i64,
    pub unit: TimeUnit,
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} from now", self.magnitude, self.unit.as_str())
    }
}

/// Nearest integer with halves toward positive infinity, so `-1.5` becomes `-1`.
#[allow(clippy::cast_possible_truncation)]
fn round_nearest(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[allow(clippy::cast_precision_loss)]
fn scale(value: i64, divisor: f64) -> i64 {
    round_nearest(value as f64 / divisor)
}

/// Picks the coarsest unit that keeps the magnitude readable.
#[must_use]
pub fn relative_time(when: DateTime<Utc>, now: DateTime<Utc>) -> RelativeTime {
    let at = |magnitude, unit| RelativeTime { magnitude, unit };

    let seconds = scale((when - now).num_milliseconds(), 1000.0);
    if seconds.abs() < SECONDS_LIMIT {
        return at(seconds, TimeUnit::Seconds);
    }
    let minutes = scale(seconds, 60.0);
    if minutes.abs() < MINUTES_LIMIT {
        return at(minutes, TimeUnit::Minutes);
    }
    let hours = scale(minutes, 60.0);
    if hours.abs() < HOURS_LIMIT {
        return at(hours, TimeUnit::Hours);
    }
    let days = scale(hours, 24.0);
    if days.abs() < DAYS_LIMIT {
        return at(days, TimeUnit::Days);
    }
    let weeks = scale(days, 7.0);
    if weeks.abs() < WEEKS_LIMIT {
        return at(weeks, TimeUnit::Weeks);
    }
    at(scale(weeks, WEEKS_PER_MONTH), TimeUnit::Months)
}

#[must_use]
pub fn format_relative(when: DateTime<Utc>, now: DateTime<Utc>) -> String {
    relative_time(when, now).to_string()
}
