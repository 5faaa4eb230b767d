//! Pure grouping and classification queries over a normalized record set.
//!
//! Every function borrows the records and returns a fresh table. Buckets
//! are sparse: a group with no records never appears in the output.

use std::collections::{BTreeMap, BTreeSet};
use serde::Serialize;
use tracing::{debug, warn};

use crate::dates::YearMonth;
use crate::model::{
    AssessmentRecord, BandMonthCount, BandPercentage, ClassifiedRecord, DateBucketCount,
    MonthBucketCount, MonthlyUniquePatientCount, PatientFrequency, PatientMonthPresence,
    PatientTimeline, PipelineError, TimelinePoint,
};
use crate::severity::{classify_score, Ontology, SeverityBand};

/// A record excluded from a classification, with the reason.
#[derive(Debug)]
pub struct Rejection {
    pub record: AssessmentRecord,
    pub error: PipelineError,
}

#[derive(Debug)]
pub struct Classified<T> {
    pub rows: Vec<T>,
    pub rejected: Vec<Rejection>,
}

/// Band counts or shares together with the number of records left out.
#[derive(Clone, Debug, Serialize)]
pub struct BandTable<T> {
    pub rows: Vec<T>,
    pub rejected: usize,
}

pub fn count_by_date(records: &[AssessmentRecord]) -> Vec<DateBucketCount> {
    let mut map = BTreeMap::new();
    for record in records {
        *map.entry(record.date).or_insert(0) += 1;
    }

    map.into_iter()
        .map(|(date, count)| DateBucketCount { date, count })
        .collect()
}

pub fn count_by_month(records: &[AssessmentRecord]) -> Vec<MonthBucketCount> {
    let mut map: BTreeMap<YearMonth, usize> = BTreeMap::new();
    for record in records {
        *map.entry(record.month()).or_insert(0) += 1;
    }

    map.into_iter()
        .map(|(month, count)| MonthBucketCount {
            year: month.year,
            month: month.month,
            label: month.label(),
            count,
        })
        .collect()
}

/// Submissions per patient, most frequent first; ties go to the lower id.
pub fn frequency_by_patient(records: &[AssessmentRecord]) -> Vec<PatientFrequency> {
    let mut map: BTreeMap<i64, usize> = BTreeMap::new();
    for record in records {
        *map.entry(record.patient_id).or_insert(0) += 1;
    }

    let mut output: Vec<PatientFrequency> = map
        .into_iter()
        .map(|(patient_id, count)| PatientFrequency { patient_id, count })
        .collect();
    // Stable sort keeps the ascending-id order from the map for equal counts.
    output.sort_by(|a, b| b.count.cmp(&a.count));
    output
}

pub fn unique_patient_count(records: &[AssessmentRecord]) -> usize {
    records.iter().map(|r| r.patient_id).collect::<BTreeSet<_>>().len()
}

pub fn top_patients(frequencies: &[PatientFrequency], n: usize) -> Vec<i64> {
    frequencies.iter().take(n).map(|f| f.patient_id).collect()
}

/// Percentage of patients who submitted exactly once.
pub fn single_submission_share(frequencies: &[PatientFrequency]) -> Result<f64, PipelineError> {
    let once = frequencies.iter().filter(|f| f.count == 1).count();
    percentage(once, frequencies.len(), "patient frequencies")
}

pub fn patient_month_presence(records: &[AssessmentRecord]) -> Vec<PatientMonthPresence> {
    let pairs: BTreeSet<(YearMonth, i64)> = records
        .iter()
        .map(|r| (r.month(), r.patient_id))
        .collect();

    pairs
        .into_iter()
        .map(|(month, patient_id)| PatientMonthPresence {
            year: month.year,
            month: month.month,
            patient_id,
        })
        .collect()
}

/// Distinct patients per month, collapsed from [`patient_month_presence`].
pub fn unique_patients_by_month(records: &[AssessmentRecord]) -> Vec<MonthlyUniquePatientCount> {
    let mut map: BTreeMap<YearMonth, usize> = BTreeMap::new();
    for presence in patient_month_presence(records) {
        let key = YearMonth { year: presence.year, month: presence.month };
        *map.entry(key).or_insert(0) += 1;
    }

    map.into_iter()
        .map(|(month, patients)| MonthlyUniquePatientCount {
            year: month.year,
            month: month.month,
            label: month.label(),
            patients,
        })
        .collect()
}

/// Groups records by calendar year, input order preserved within a year.
pub fn partition_by_year(records: &[AssessmentRecord]) -> BTreeMap<i32, Vec<AssessmentRecord>> {
    let mut map: BTreeMap<i32, Vec<AssessmentRecord>> = BTreeMap::new();
    for record in records {
        map.entry(record.month().year).or_default().push(record.clone());
    }
    map
}

/// Annotates each record with its band. Out-of-range scores are excluded
/// and reported in `rejected`.
pub fn classify(records: &[AssessmentRecord], ontology: Ontology) -> Classified<ClassifiedRecord> {
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for record in records {
        match classify_score(record.score, ontology, &record.describe()) {
            Ok(band) => rows.push(ClassifiedRecord { record: record.clone(), band }),
            Err(error) => rejected.push(Rejection { record: record.clone(), error }),
        }
    }

    Classified { rows, rejected }
}

pub fn band_counts_by_month(
    records: &[AssessmentRecord],
    ontology: Ontology,
) -> BandTable<BandMonthCount> {
    let classified = classify(records, ontology);
    for rejection in &classified.rejected {
        warn!("excluding {}: {}", rejection.record.describe(), rejection.error);
    }

    let mut map: BTreeMap<(YearMonth, SeverityBand), usize> = BTreeMap::new();
    for row in &classified.rows {
        *map.entry((row.record.month(), row.band)).or_insert(0) += 1;
    }

    let rows = map
        .into_iter()
        .map(|((month, band), count)| {
            debug!("{} {}: {}", month.label(), band.label(), count);
            BandMonthCount {
                year: month.year,
                month: month.month,
                label: month.label(),
                band,
                count,
            }
        })
        .collect();

    BandTable { rows, rejected: classified.rejected.len() }
}

pub fn zone_counts_by_month(records: &[AssessmentRecord]) -> BandTable<BandMonthCount> {
    band_counts_by_month(records, Ontology::Binary)
}

/// Share of each band within its month, in percent.
///
/// A month that has records but none of them classifiable fails with
/// [`PipelineError::EmptyGroup`].
pub fn band_percentages(
    records: &[AssessmentRecord],
    ontology: Ontology,
) -> Result<BandTable<BandPercentage>, PipelineError> {
    let counts = band_counts_by_month(records, ontology);

    let mut totals: BTreeMap<YearMonth, usize> = records
        .iter()
        .map(|r| (r.month(), 0))
        .collect();
    for row in &counts.rows {
        let key = YearMonth { year: row.year, month: row.month };
        *totals.entry(key).or_insert(0) += row.count;
    }

    if let Some((month, _)) = totals.iter().find(|(_, total)| **total == 0) {
        return Err(PipelineError::EmptyGroup(format!(
            "no classifiable records in {}",
            month.label()
        )));
    }

    let mut rows = Vec::with_capacity(counts.rows.len());
    for row in counts.rows {
        let key = YearMonth { year: row.year, month: row.month };
        let percentage = percentage(row.count, totals[&key], &row.label)?;
        rows.push(BandPercentage {
            year: row.year,
            month: row.month,
            label: row.label,
            band: row.band,
            percentage,
        });
    }

    Ok(BandTable { rows, rejected: counts.rejected })
}

pub fn zone_percentages(
    records: &[AssessmentRecord],
) -> Result<BandTable<BandPercentage>, PipelineError> {
    band_percentages(records, Ontology::Binary)
}

/// One patient's scores in submission order, with their mean.
pub fn timeline(
    records: &[AssessmentRecord],
    patient_id: i64,
) -> Result<PatientTimeline, PipelineError> {
    let mut points: Vec<TimelinePoint> = records
        .iter()
        .filter(|r| r.patient_id == patient_id)
        .map(|r| TimelinePoint { timestamp: r.timestamp, score: r.score })
        .collect();
    if points.is_empty() {
        return Err(PipelineError::EmptyGroup(format!("no records for patient {}", patient_id)));
    }
    points.sort_by_key(|p| p.timestamp);

    let sum: i64 = points.iter().map(|p| p.score).sum();
    let mean = sum as f64 / points.len() as f64;

    Ok(PatientTimeline { patient_id, points, mean })
}

fn percentage(part: usize, total: usize, what: &str) -> Result<f64, PipelineError> {
    if total == 0 {
        return Err(PipelineError::EmptyGroup(what.to_string()));
    }
    Ok(part as f64 / total as f64 * 100.0)
}
