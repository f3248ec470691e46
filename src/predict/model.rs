//! Loading and evaluating exported tabular models.

use std::fs;
use std::path::Path;

use ndarray::{Array1, ArrayView1};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::error::ModelError;
use super::preprocess::{ensure_finite, numeric_columns, Preprocessor, PreprocessorSpec};
use super::record::Record;
use super::tree::{ForestClassifier, ForestRegressor, TreeSpec};

/// On-disk artifact. `input_columns` names the raw features when there is no
/// preprocessor; with a preprocessor the columns come from its transformers.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input_columns: Vec<String>,
    #[serde(default)]
    pub preprocessor: Option<PreprocessorSpec>,
    pub estimator: EstimatorSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    Linear {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    ForestRegressor {
        n_features: usize,
        trees: Vec<TreeSpec>,
        #[serde(default)]
        feature_importances: Vec<f64>,
    },
    ForestClassifier {
        n_features: usize,
        classes: Vec<serde_json::Value>,
        trees: Vec<TreeSpec>,
        #[serde(default)]
        feature_importances: Vec<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Regression,
    Classification,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Regression => "regression",
            Task::Classification => "classification",
        }
    }
}

#[derive(Debug, Clone)]
enum Estimator {
    Linear {
        coefficients: Array1<f64>,
        intercept: f64,
    },
    ForestRegressor(ForestRegressor),
    ForestClassifier(ForestClassifier),
}

/// An immutable fitted model. Safe to share across requests.
#[derive(Debug, Clone)]
pub struct TabularModel {
    name: String,
    preprocessor: Option<Preprocessor>,
    input_columns: Vec<String>,
    feature_names: Vec<String>,
    estimator: Estimator,
    feature_importances: Vec<f64>,
    digest: String,
}

impl TabularModel {
    /// Reads, optionally verifies, and compiles an artifact file.
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ModelError> {
        let bytes = fs::read(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let digest = hex::encode(Sha256::digest(&bytes));

        if let Some(expected) = expected_sha256 {
            if !expected.eq_ignore_ascii_case(&digest) {
                return Err(ModelError::Checksum {
                    path: path.to_path_buf(),
                    expected: expected.to_string(),
                    actual: digest,
                });
            }
        }

        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ModelError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        let mut model = Self::from_artifact(artifact)?;
        if model.name.is_empty() {
            model.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        model.digest = digest;
        Ok(model)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let preprocessor = artifact.preprocessor.map(Preprocessor::compile).transpose()?;

        let (estimator, n_features, importances) = match artifact.estimator {
            EstimatorSpec::Linear {
                coefficients,
                intercept,
            } => {
                if coefficients.is_empty() {
                    return Err(invalid("linear model has no coefficients"));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err(invalid("linear model has non-finite parameters"));
                }
                let n = coefficients.len();
                (
                    Estimator::Linear {
                        coefficients: Array1::from_vec(coefficients),
                        intercept,
                    },
                    n,
                    Vec::new(),
                )
            }
            EstimatorSpec::ForestRegressor {
                n_features,
                trees,
                feature_importances,
            } => (
                Estimator::ForestRegressor(ForestRegressor::compile(trees, n_features)?),
                n_features,
                feature_importances,
            ),
            EstimatorSpec::ForestClassifier {
                n_features,
                classes,
                trees,
                feature_importances,
            } => (
                Estimator::ForestClassifier(ForestClassifier::compile(
                    trees,
                    n_features,
                    classes.len(),
                )?),
                n_features,
                feature_importances,
            ),
        };

        let (input_columns, feature_names) = match &preprocessor {
            Some(pre) => {
                if pre.output_width() != n_features {
                    return Err(invalid(format!(
                        "preprocessor emits {} features but the estimator expects {}",
                        pre.output_width(),
                        n_features
                    )));
                }
                (pre.input_columns().to_vec(), pre.feature_names_out().to_vec())
            }
            None => {
                let columns = if artifact.input_columns.is_empty() {
                    (0..n_features).map(|i| format!("x{}", i)).collect()
                } else {
                    artifact.input_columns
                };
                if columns.len() != n_features {
                    return Err(invalid(format!(
                        "{} input columns declared but the estimator expects {}",
                        columns.len(),
                        n_features
                    )));
                }
                (columns.clone(), columns)
            }
        };

        if !importances.is_empty() && importances.len() != feature_names.len() {
            return Err(invalid(format!(
                "{} feature importances for {} features",
                importances.len(),
                feature_names.len()
            )));
        }

        Ok(Self {
            name: artifact.name.unwrap_or_default(),
            preprocessor,
            input_columns,
            feature_names,
            estimator,
            feature_importances: importances,
            digest: String::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex SHA-256 of the artifact file; empty for in-memory artifacts.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn task(&self) -> Task {
        match self.estimator {
            Estimator::Linear { .. } | Estimator::ForestRegressor(_) => Task::Regression,
            Estimator::ForestClassifier(_) => Task::Classification,
        }
    }

    /// Arity of a raw feature vector accepted by [`Self::predict`].
    pub fn n_features(&self) -> usize {
        self.input_columns.len()
    }

    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    /// Regression output for a raw, ordered feature vector.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        let x = self.vector_input(features)?;
        self.regress(x.view())
    }

    /// Regression output for a named record.
    pub fn predict_record(&self, record: &Record) -> Result<f64, ModelError> {
        let x = self.record_input(record)?;
        self.regress(x.view())
    }

    /// Positive-class probability for a raw, ordered feature vector.
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        let x = self.vector_input(features)?;
        self.positive_proba(x.view())
    }

    /// Positive-class probability for a named record.
    pub fn predict_proba_record(&self, record: &Record) -> Result<f64, ModelError> {
        let x = self.record_input(record)?;
        self.positive_proba(x.view())
    }

    /// (transformed feature name, importance) pairs, sorted by descending
    /// importance. Ties keep declaration order.
    pub fn ranked_importances(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .map(String::as_str)
            .zip(self.feature_importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    fn vector_input(&self, features: &[f64]) -> Result<Array1<f64>, ModelError> {
        if self.preprocessor.is_some() {
            return Err(ModelError::RecordRequired);
        }
        if features.len() != self.n_features() {
            return Err(ModelError::Arity {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        let x = ArrayView1::from(features);
        ensure_finite(x, &self.input_columns)?;
        Ok(x.to_owned())
    }

    fn record_input(&self, record: &Record) -> Result<Array1<f64>, ModelError> {
        match &self.preprocessor {
            Some(pre) => pre.transform(record),
            None => numeric_columns(record, &self.input_columns),
        }
    }

    fn regress(&self, x: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        let value = match &self.estimator {
            Estimator::Linear {
                coefficients,
                intercept,
            } => coefficients.dot(&x) + intercept,
            Estimator::ForestRegressor(forest) => forest.predict(x),
            Estimator::ForestClassifier(_) => {
                return Err(ModelError::UnsupportedTask {
                    operation: "predict",
                    task: Task::Classification.as_str(),
                })
            }
        };
        finite_output("prediction", value)
    }

    fn positive_proba(&self, x: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        match &self.estimator {
            Estimator::ForestClassifier(forest) => {
                finite_output("probability", forest.predict_proba(x)[1])
            }
            _ => Err(ModelError::UnsupportedTask {
                operation: "predict_proba",
                task: Task::Regression.as_str(),
            }),
        }
    }
}

/// Finite inputs can still overflow a dot product or a leaf average.
fn finite_output(what: &'static str, value: f64) -> Result<f64, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFiniteOutput(what))
    }
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::InvalidArtifact(msg.into())
}
