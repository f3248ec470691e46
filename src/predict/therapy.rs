//! Therapy-effectiveness classification over a fixed patient record.

use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::model::TabularModel;
use super::record::Record;

/// Probability at or above which a therapy counts as effective.
pub const EFFECTIVE_THRESHOLD: f64 = 0.5;

const TOP_FACTOR_COUNT: usize = 5;

/// Request body for the therapy endpoints. Every field is required. The
/// aliases accept the column-style names used by older clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapyRecord {
    #[serde(alias = "INSULIN REGIMEN")]
    pub insulin_regimen: String,
    #[serde(alias = "HbA1c1")]
    pub hba1c1: f64,
    #[serde(alias = "HbA1c2")]
    pub hba1c2: f64,
    #[serde(alias = "HbA1c3")]
    pub hba1c3: f64,
    #[serde(alias = "HbA1c_Delta_1_2")]
    pub hba1c_delta_1_2: f64,
    pub gap_initial_visit: f64,
    pub gap_first_clinical: f64,
    #[serde(alias = "eGFR")]
    pub egfr: f64,
    pub reduction_percent: f64,
    #[serde(alias = "FVG1")]
    pub fvg1: f64,
    #[serde(alias = "FVG2")]
    pub fvg2: f64,
    #[serde(alias = "FVG3")]
    pub fvg3: f64,
    #[serde(alias = "FVG_Delta_1_2")]
    pub fvg_delta_1_2: f64,
    #[serde(alias = "DDS1")]
    pub dds1: f64,
    #[serde(alias = "DDS3")]
    pub dds3: f64,
    #[serde(alias = "DDS_Trend_1_3")]
    pub dds_trend_1_3: f64,
}

impl TherapyRecord {
    /// Row keyed by the training-time column names.
    pub fn to_record(&self) -> Record {
        Record::new()
            .with_text("INSULIN REGIMEN", self.insulin_regimen.clone())
            .with_number("HbA1c1", self.hba1c1)
            .with_number("HbA1c2", self.hba1c2)
            .with_number("HbA1c3", self.hba1c3)
            .with_number("HbA1c_Delta_1_2", self.hba1c_delta_1_2)
            .with_number("Gap from initial visit (days)", self.gap_initial_visit)
            .with_number("Gap from first clinical visit (days)", self.gap_first_clinical)
            .with_number("eGFR", self.egfr)
            .with_number("Reduction (%)", self.reduction_percent)
            .with_number("FVG1", self.fvg1)
            .with_number("FVG2", self.fvg2)
            .with_number("FVG3", self.fvg3)
            .with_number("FVG_Delta_1_2", self.fvg_delta_1_2)
            .with_number("DDS1", self.dds1)
            .with_number("DDS3", self.dds3)
            .with_number("DDS_Trend_1_3", self.dds_trend_1_3)
    }

    pub fn hba1c_visits(&self) -> [f64; 3] {
        [self.hba1c1, self.hba1c2, self.hba1c3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TherapyStatus {
    Effective,
    Ineffective,
}

impl TherapyStatus {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= EFFECTIVE_THRESHOLD {
            TherapyStatus::Effective
        } else {
            TherapyStatus::Ineffective
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TherapyAssessment {
    pub probability: f64,
    pub status: TherapyStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopFactor {
    pub feature: String,
    pub importance: f64,
}

/// Single-visit assessment. The label comes from the unrounded probability;
/// the reported probability is rounded to two places.
pub fn assess(model: &TabularModel, patient: &TherapyRecord) -> Result<TherapyAssessment, ModelError> {
    let probability = model.predict_proba_record(&patient.to_record())?;
    Ok(TherapyAssessment {
        probability: round_to(probability, 2),
        status: TherapyStatus::from_probability(probability),
    })
}

/// Effectiveness probability along the three visits, each evaluated with
/// that visit's HbA1c in the `HbA1c1` slot. Rounded to three places.
pub fn pathline(model: &TabularModel, patient: &TherapyRecord) -> Result<[f64; 3], ModelError> {
    let mut record = patient.to_record();
    let mut probabilities = [0.0; 3];
    for (slot, visit) in probabilities.iter_mut().zip(patient.hba1c_visits()) {
        record.set_number("HbA1c1", visit);
        *slot = round_to(model.predict_proba_record(&record)?, 3);
    }
    Ok(probabilities)
}

/// The model's most influential transformed features.
pub fn top_factors(model: &TabularModel) -> Vec<TopFactor> {
    model
        .ranked_importances()
        .into_iter()
        .take(TOP_FACTOR_COUNT)
        .map(|(feature, importance)| TopFactor {
            feature: feature.to_string(),
            importance: round_to(importance, 4),
        })
        .collect()
}

/// Rounds half away from zero. Values too large to scale are returned as is.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
