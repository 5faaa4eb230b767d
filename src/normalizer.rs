use std::collections::HashSet;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dates::{parse_date, parse_timestamp};
use crate::model::{AssessmentRecord, PipelineError, RawRecord};
use crate::severity::in_range;

/// Output of the normalizer: validated records in input order, plus the
/// rows set aside because of their assessment type.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Normalized {
    pub records: Vec<AssessmentRecord>,
    pub rejected: Vec<RawRecord>,
    pub duplicates: usize,
}

/// Deduplicates, filters by `expected_type` and parses the surviving rows.
///
/// Duplicates are exact field matches (the row index is ignored) and the
/// first occurrence wins. Type mismatches are flagged into `rejected`
/// before any value is parsed, so a foreign instrument never aborts the
/// run. Any malformed or out-of-range value in a kept row is fatal.
pub fn normalize(rows: &[RawRecord], expected_type: &str) -> Result<Normalized, PipelineError> {
    let mut seen: HashSet<[&str; 5]> = HashSet::new();
    let mut records = Vec::new();
    let mut rejected = Vec::new();
    let mut duplicates = 0;

    for raw in rows {
        if !seen.insert(raw.fields()) {
            debug!("dropping duplicate row {}", raw.row);
            duplicates += 1;
            continue;
        }

        if raw.assessment_type != expected_type {
            rejected.push(raw.clone());
            continue;
        }

        records.push(parse_row(raw)?);
    }

    if !rejected.is_empty() {
        warn!("{} rows are not of type {}", rejected.len(), expected_type);
    }
    if duplicates > 0 {
        warn!("removed {} duplicate rows", duplicates);
    }

    Ok(Normalized { records, rejected, duplicates })
}

pub fn parse_row(raw: &RawRecord) -> Result<AssessmentRecord, PipelineError> {
    let parse_err = |message: String| PipelineError::Parse { row: raw.row, message };

    let timestamp = parse_timestamp(&raw.timestamp)
        .ok_or_else(|| parse_err(format!("malformed timestamp {:?}", raw.timestamp)))?;
    let created_date = parse_date(&raw.created_date)
        .ok_or_else(|| parse_err(format!("malformed created date {:?}", raw.created_date)))?;
    let patient_id = raw.patient_id.parse::<i64>()
        .map_err(|_| parse_err(format!("malformed patient id {:?}", raw.patient_id)))?;
    let score = raw.score.parse::<i64>()
        .map_err(|_| parse_err(format!("malformed score {:?}", raw.score)))?;

    if !in_range(score) {
        return Err(PipelineError::Range { score, context: format!("row {}", raw.row) });
    }

    Ok(AssessmentRecord {
        timestamp,
        date: timestamp.date(),
        patient_id,
        assessment_type: raw.assessment_type.clone(),
        created_date,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(row: usize, timestamp: &str, patient_id: &str, kind: &str, score: &str) -> RawRecord {
        RawRecord {
            row,
            timestamp: timestamp.into(),
            patient_id: patient_id.into(),
            assessment_type: kind.into(),
            created_date: "2019-01-01".into(),
            score: score.into(),
        }
    }

    fn render(records: &[AssessmentRecord]) -> Vec<RawRecord> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| RawRecord {
                row: index + 1,
                timestamp: record.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                patient_id: record.patient_id.to_string(),
                assessment_type: record.assessment_type.clone(),
                created_date: record.created_date.format("%Y-%m-%d").to_string(),
                score: record.score.to_string(),
            })
            .collect()
    }

    #[test]
    fn keeps_first_duplicate() {
        let rows = vec![
            raw(1, "2019-06-18T10:00:00", "100", "gad7", "20"),
            raw(2, "2019-06-18T11:00:00", "100", "gad7", "5"),
            raw(3, "2019-06-18T10:00:00", "100", "gad7", "20"),
        ];
        let out = normalize(&rows, "gad7").unwrap();
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.duplicates, 1);
        assert_eq!(out.records[0].score, 20);
        assert_eq!(out.records[1].score, 5);
    }

    #[test]
    fn foreign_types_are_flagged_not_fatal() {
        let rows = vec![
            raw(1, "2019-06-18T10:00:00", "100", "gad7", "20"),
            raw(2, "2019-06-18T11:00:00", "100", "phq9", "27"),
        ];
        let out = normalize(&rows, "gad7").unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].row, 2);
    }

    #[test]
    fn date_drops_time_of_day() {
        let rows = vec![raw(1, "2019-08-26T13:32:43.019162", "7", "gad7", "3")];
        let out = normalize(&rows, "gad7").unwrap();
        let record = &out.records[0];
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2019, 8, 26).unwrap());
        assert_eq!(record.timestamp.format("%H:%M:%S").to_string(), "13:32:43");
        assert_eq!(record.created_date, NaiveDate::from_ymd_opt(2019, 1, 1).unwrap());
    }

    #[test]
    fn malformed_timestamp_is_parse_error() {
        let rows = vec![
            raw(1, "2019-06-18T10:00:00", "100", "gad7", "20"),
            raw(2, "18/06/2019 10:00", "100", "gad7", "20"),
        ];
        match normalize(&rows, "gad7") {
            Err(PipelineError::Parse { row, .. }) => assert_eq!(row, 2),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn malformed_score_is_parse_error() {
        let rows = vec![raw(5, "2019-06-18T10:00:00", "100", "gad7", "ten")];
        assert!(matches!(normalize(&rows, "gad7"), Err(PipelineError::Parse { row: 5, .. })));
    }

    #[test]
    fn out_of_range_score_is_range_error() {
        let rows = vec![raw(3, "2019-06-18T10:00:00", "100", "gad7", "22")];
        match normalize(&rows, "gad7") {
            Err(PipelineError::Range { score, context }) => {
                assert_eq!(score, 22);
                assert_eq!(context, "row 3");
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let rows = vec![
            raw(1, "2019-06-18T10:00:00.250000", "100", "gad7", "20"),
            raw(2, "2019-06-18T11:00:00", "100", "gad7", "5"),
            raw(3, "2019-06-18T11:00:00", "100", "gad7", "5"),
            raw(4, "2019-06-19T09:00:00", "200", "gad7", "12"),
        ];
        let first = normalize(&rows, "gad7").unwrap();
        let second = normalize(&render(&first.records), "gad7").unwrap();
        assert_eq!(second.records, first.records);
        assert_eq!(second.duplicates, 0);
        assert!(second.rejected.is_empty());
    }
}
