use std::collections::BTreeMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::{self, BandTable};
use crate::config::PipelineConfig;
use crate::model::{
    BandMonthCount, BandPercentage, DateBucketCount, MonthBucketCount, MonthlyUniquePatientCount,
    PatientFrequency, PatientTimeline, PipelineError, SourceInfo,
};
use crate::normalizer::Normalized;
use crate::severity::Ontology;

#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub rows_read: usize,
    pub duplicates: usize,
    pub rejected_by_type: usize,
    pub records: usize,
    pub unique_patients: usize,
    /// Percent of patients with a single submission; absent when there are
    /// no patients.
    pub single_submission_share: Option<f64>,
    pub rejected_by_classification: usize,
}

/// Every table the pipeline produces, ready for a charting layer.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub source: SourceInfo,
    pub summary: Summary,
    pub count_by_date: Vec<DateBucketCount>,
    pub count_by_date_per_year: BTreeMap<i32, Vec<DateBucketCount>>,
    pub count_by_month: Vec<MonthBucketCount>,
    pub frequency_by_patient: Vec<PatientFrequency>,
    pub unique_patients_by_month: Vec<MonthlyUniquePatientCount>,
    pub zone_counts_by_month: Vec<BandMonthCount>,
    pub zone_percentages: Option<Vec<BandPercentage>>,
    pub severity_counts_by_month: Vec<BandMonthCount>,
    pub severity_percentages: Option<Vec<BandPercentage>>,
    pub timelines: Vec<PatientTimeline>,
}

/// Percentage tables degrade to `None` rather than aborting the report.
fn shares_or_warn(
    result: Result<BandTable<BandPercentage>, PipelineError>,
    what: &str,
) -> Option<Vec<BandPercentage>> {
    match result {
        Ok(table) => Some(table.rows),
        Err(err) => {
            warn!("skipping {}: {}", what, err);
            None
        },
    }
}

pub fn build_report(
    normalized: &Normalized,
    source: SourceInfo,
    config: &PipelineConfig,
) -> Report {
    let records = &normalized.records;

    let frequency_by_patient = aggregator::frequency_by_patient(records);
    let single_submission_share = aggregator::single_submission_share(&frequency_by_patient).ok();

    let zones = aggregator::zone_counts_by_month(records);
    let severity = aggregator::band_counts_by_month(records, Ontology::FourLevel);
    if zones.rejected > 0 {
        warn!("{} records could not be classified", zones.rejected);
    }

    let count_by_date_per_year = aggregator::partition_by_year(records)
        .into_iter()
        .map(|(year, in_year)| (year, aggregator::count_by_date(&in_year)))
        .collect();

    let mut timelines = Vec::new();
    for patient_id in aggregator::top_patients(&frequency_by_patient, config.top_patients) {
        match aggregator::timeline(records, patient_id) {
            Ok(line) => {
                info!(
                    "patient {}: {} assessments, mean score {:.2}",
                    patient_id,
                    line.points.len(),
                    line.mean
                );
                timelines.push(line);
            },
            Err(err) => warn!("skipping timeline: {}", err),
        }
    }

    let summary = Summary {
        rows_read: source.rows_read,
        duplicates: normalized.duplicates,
        rejected_by_type: normalized.rejected.len(),
        records: records.len(),
        unique_patients: aggregator::unique_patient_count(records),
        single_submission_share,
        rejected_by_classification: zones.rejected,
    };

    Report {
        source,
        summary,
        count_by_date: aggregator::count_by_date(records),
        count_by_date_per_year,
        count_by_month: aggregator::count_by_month(records),
        frequency_by_patient,
        unique_patients_by_month: aggregator::unique_patients_by_month(records),
        zone_counts_by_month: zones.rows,
        zone_percentages: shares_or_warn(aggregator::zone_percentages(records), "zone percentages"),
        severity_counts_by_month: severity.rows,
        severity_percentages: shares_or_warn(
            aggregator::band_percentages(records, Ontology::FourLevel),
            "severity percentages",
        ),
        timelines,
    }
}
