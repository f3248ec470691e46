//! HbA1c risk regression over demographic and visit-frequency attributes.

use serde::{Deserialize, Deserializer, Serialize};

use super::error::ModelError;
use super::model::TabularModel;
use super::record::Record;
use super::therapy::round_to;

/// Request body for `/predict-risk`. Accepts either the training column
/// names (`AGE`, `DURATION DM`, ...) or their snake_case equivalents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRecord {
    #[serde(alias = "AGE")]
    pub age: f64,
    #[serde(alias = "GENDER", deserialize_with = "whole_number")]
    pub gender: i64,
    #[serde(alias = "DURATION DM")]
    pub duration_dm: f64,
    #[serde(alias = "Freq SMBG")]
    pub freq_smbg: f64,
    #[serde(alias = "Freq Hypo")]
    pub freq_hypo: f64,
    #[serde(alias = "Freq of Visits")]
    pub freq_visits: f64,
    #[serde(alias = "eGFR")]
    pub egfr: f64,
    #[serde(alias = "CKD Stage", deserialize_with = "whole_number")]
    pub ckd_stage: i64,
}

impl RiskRecord {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with_number("AGE", self.age)
            .with_number("GENDER", self.gender as f64)
            .with_number("DURATION DM", self.duration_dm)
            .with_number("Freq SMBG", self.freq_smbg)
            .with_number("Freq Hypo", self.freq_hypo)
            .with_number("Freq of Visits", self.freq_visits)
            .with_number("eGFR", self.egfr)
            .with_number("CKD Stage", self.ckd_stage as f64)
    }
}

/// Integer codes arrive as `1` or `1.0` depending on the client.
fn whole_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || !(i64::MIN as f64..=i64::MAX as f64).contains(&value) {
        return Err(serde::de::Error::custom(format!(
            "expected a whole number, got {}",
            value
        )));
    }
    Ok(value as i64)
}

/// Predicted target HbA1c, rounded to three places.
pub fn predict_hba1c(model: &TabularModel, patient: &RiskRecord) -> Result<f64, ModelError> {
    let value = model.predict_record(&patient.to_record())?;
    Ok(round_to(value, 3))
}
