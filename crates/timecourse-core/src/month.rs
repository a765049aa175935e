//! Calendar-month keys, the observation window and timestamp parsing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimecourseError};

// ── MonthBucket ───────────────────────────────────────────────────────────────

/// A (year, month) grouping key. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MonthBucket {
    year: i32,
    month: u32,
}

impl MonthBucket {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: &NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn from_datetime(ts: &NaiveDateTime) -> Self {
        Self::from_date(&ts.date())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Signed number of months from `earlier` to `self`.
    pub fn months_since(&self, earlier: &MonthBucket) -> i64 {
        self.ordinal() - earlier.ordinal()
    }

    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthBucket {
    type Err = TimecourseError;

    /// Parses the `YYYY-MM` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TimecourseError::Config(format!("invalid month key: {s}"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl From<MonthBucket> for String {
    fn from(bucket: MonthBucket) -> Self {
        bucket.to_string()
    }
}

impl TryFrom<String> for MonthBucket {
    type Error = TimecourseError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

// ── MonthWindow ───────────────────────────────────────────────────────────────

/// Half-open observation window `[start, end)` and its month grid.
///
/// The only constructor rejects `start >= end`, so every window in
/// circulation has at least one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl MonthWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(TimecourseError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Inclusive lower bound.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `true` when `start 00:00 <= ts < end 00:00`.
    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        *ts >= self.start.and_time(NaiveTime::MIN) && *ts < self.end.and_time(NaiveTime::MIN)
    }

    pub fn first_bucket(&self) -> MonthBucket {
        MonthBucket::from_date(&self.start)
    }

    /// Month of the last day inside the window.
    pub fn last_bucket(&self) -> MonthBucket {
        let last_day = self.end.pred_opt().unwrap_or(self.start);
        MonthBucket::from_date(&last_day)
    }

    /// Number of months overlapping the window.
    pub fn month_count(&self) -> usize {
        let span = self.last_bucket().months_since(&self.first_bucket());
        usize::try_from(span).map_or(1, |n| n + 1)
    }

    /// Every month overlapping the window, in order.
    pub fn buckets(&self) -> Vec<MonthBucket> {
        let mut out = Vec::with_capacity(self.month_count());
        let mut current = self.first_bucket();
        for _ in 0..self.month_count() {
            out.push(current);
            current = current.succ();
        }
        out
    }

    /// Offset of `bucket` in the month grid, or `None` outside the window.
    pub fn index_of(&self, bucket: &MonthBucket) -> Option<usize> {
        let offset = usize::try_from(bucket.months_since(&self.first_bucket())).ok()?;
        (offset < self.month_count()).then_some(offset)
    }
}

// ── Timestamp parsing ─────────────────────────────────────────────────────────

/// Parse a posts-table timestamp into a timezone-naive instant.
///
/// Offsets (including a trailing `Z`) are accepted and discarded; the
/// wall-clock reading is kept. A bare date resolves to midnight.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TimecourseError::UnparseableTimestamp(raw.to_string()));
    }

    let normalised = match s.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => s.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
        return Ok(dt.naive_local());
    }

    const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%:z"];
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalised, fmt) {
            return Ok(dt.naive_local());
        }
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(TimecourseError::UnparseableTimestamp(raw.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
