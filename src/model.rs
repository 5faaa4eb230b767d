use serde::{Serialize, Deserialize};
use std::path::PathBuf;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use crate::dates::YearMonth;
use crate::severity::SeverityBand;

/// One loader row, fields kept as trimmed text until the normalizer
/// validates them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based index of the data row (the header is not counted).
    pub row: usize,
    pub timestamp: String,
    pub patient_id: String,
    pub assessment_type: String,
    pub created_date: String,
    pub score: String,
}

impl RawRecord {
    /// Field values used for exact-row deduplication.
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.timestamp,
            &self.patient_id,
            &self.assessment_type,
            &self.created_date,
            &self.score,
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AssessmentRecord {
    pub timestamp: NaiveDateTime,
    /// Calendar date of `timestamp`, the bucketing key.
    pub date: NaiveDate,
    pub patient_id: i64,
    pub assessment_type: String,
    pub created_date: NaiveDate,
    pub score: i64,
}

impl AssessmentRecord {
    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.date)
    }

    /// Short identification used in diagnostics.
    pub fn describe(&self) -> String {
        format!("patient {} at {}", self.patient_id, self.timestamp)
    }
}

/// Ingest metadata attached to a loaded batch.
#[derive(Clone, Debug, Serialize)]
pub struct SourceInfo {
    pub source: String,
    pub path: PathBuf,
    pub rows_read: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DateBucketCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MonthBucketCount {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PatientFrequency {
    pub patient_id: i64,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PatientMonthPresence {
    pub year: i32,
    pub month: u32,
    pub patient_id: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MonthlyUniquePatientCount {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub patients: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BandMonthCount {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub band: SeverityBand,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct BandPercentage {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub band: SeverityBand,
    pub percentage: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ClassifiedRecord {
    pub record: AssessmentRecord,
    pub band: SeverityBand,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TimelinePoint {
    pub timestamp: NaiveDateTime,
    pub score: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PatientTimeline {
    pub patient_id: i64,
    pub points: Vec<TimelinePoint>,
    pub mean: f64,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("score {score} out of range ({context})")]
    Range { score: i64, context: String },

    #[error("empty group: {0}")]
    EmptyGroup(String),
}

/// Seam between the pipeline and whatever produces raw rows.
pub trait RecordSource {
    fn name(&self) -> &str;
    fn parse(&self, data: &str) -> Result<Vec<RawRecord>, PipelineError>;
}
