use serde::{Serialize, Deserialize};

use crate::model::PipelineError;

pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 21;

/// Which banding of the GAD-7 score to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ontology {
    /// safe_zone / red_zone, split at 10.
    Binary,
    FourLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBand {
    SafeZone,
    RedZone,
    LowToMinimal,
    Mild,
    Moderate,
    Severe,
}

impl SeverityBand {
    pub fn label(&self) -> &'static str {
        match self {
            SeverityBand::SafeZone => "safe_zone",
            SeverityBand::RedZone => "red_zone",
            SeverityBand::LowToMinimal => "low_to_minimal",
            SeverityBand::Mild => "mild",
            SeverityBand::Moderate => "moderate",
            SeverityBand::Severe => "severe",
        }
    }
}

pub fn in_range(score: i64) -> bool {
    (SCORE_MIN..=SCORE_MAX).contains(&score)
}

/// Maps a score onto `ontology`. Scores outside 0..=21 have no band.
pub fn band_for(score: i64, ontology: Ontology) -> Option<SeverityBand> {
    let band = match ontology {
        Ontology::Binary => match score {
            0..=9 => SeverityBand::SafeZone,
            10..=21 => SeverityBand::RedZone,
            _ => return None,
        },
        Ontology::FourLevel => match score {
            0..=5 => SeverityBand::LowToMinimal,
            6..=10 => SeverityBand::Mild,
            11..=15 => SeverityBand::Moderate,
            16..=21 => SeverityBand::Severe,
            _ => return None,
        },
    };

    Some(band)
}

pub fn classify_score(
    score: i64,
    ontology: Ontology,
    context: &str,
) -> Result<SeverityBand, PipelineError> {
    band_for(score, ontology).ok_or_else(|| PipelineError::Range {
        score,
        context: context.to_string(),
    })
}
