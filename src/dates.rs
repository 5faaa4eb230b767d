use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Submission timestamp layout; the fractional part is optional.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// Accepts a bare date or a full submission timestamp.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(date);
    }

    parse_timestamp(value).map(|ts| ts.date())
}

/// Calendar month bucket. Ordering is chronological because `year` is
/// compared before `month`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    /// Rendered as `"Jun 2019"`. Display only, never a sort key. A month
    /// outside 1..=12 falls back to `"YYYY-MM"`.
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => first.format("%b %Y").to_string(),
            None => format!("{}-{:02}", self.year, self.month),
        }
    }
}
