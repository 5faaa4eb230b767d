use std::path::PathBuf;
use clap::Parser;

pub const DEFAULT_INPUT: &str = "phq_all_final.csv";
pub const EXPECTED_TYPE: &str = "gad7";
pub const TOP_PATIENTS: usize = 3;

/// Summarize GAD-7 assessment records into JSON tables.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// CSV file with columns: timestamp, patient_id, assessment_type, created_date, score
    pub input: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub expected_type: String,
    /// How many of the most frequent patients get a score timeline.
    pub top_patients: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            expected_type: EXPECTED_TYPE.to_string(),
            top_patients: TOP_PATIENTS,
        }
    }
}

impl From<Args> for PipelineConfig {
    fn from(args: Args) -> Self {
        let mut config = Self::default();
        if let Some(input) = args.input {
            config.input = input;
        }
        config
    }
}
