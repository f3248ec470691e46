//! Column transformer mapping named record columns to the estimator's
//! numeric input. Mirrors a fitted `ColumnTransformer` with scaler and
//! one-hot branches; output feature names follow its `name__column` scheme.

use ndarray::{Array1, ArrayView1};
use serde::Deserialize;

use super::error::ModelError;
use super::record::{Cell, Record};

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessorSpec {
    pub transformers: Vec<TransformerSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerSpec {
    Passthrough {
        #[serde(default = "default_numeric_name")]
        name: String,
        columns: Vec<String>,
    },
    StandardScaler {
        #[serde(default = "default_numeric_name")]
        name: String,
        columns: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    OneHot {
        #[serde(default = "default_categorical_name")]
        name: String,
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
        #[serde(default)]
        handle_unknown: HandleUnknown,
    },
}

fn default_numeric_name() -> String {
    "num".to_string()
}

fn default_categorical_name() -> String {
    "cat".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    #[default]
    Error,
    Ignore,
}

#[derive(Debug, Clone)]
enum Transformer {
    Numeric {
        columns: Vec<String>,
        mean: Option<Array1<f64>>,
        scale: Option<Array1<f64>>,
    },
    OneHot {
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
        handle_unknown: HandleUnknown,
    },
}

impl Transformer {
    fn width(&self) -> usize {
        match self {
            Transformer::Numeric { columns, .. } => columns.len(),
            Transformer::OneHot { categories, .. } => categories.iter().map(Vec::len).sum(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    transformers: Vec<Transformer>,
    input_columns: Vec<String>,
    feature_names_out: Vec<String>,
}

impl Preprocessor {
    pub fn compile(spec: PreprocessorSpec) -> Result<Self, ModelError> {
        if spec.transformers.is_empty() {
            return Err(invalid("preprocessor has no transformers"));
        }

        let mut transformers = Vec::with_capacity(spec.transformers.len());
        let mut input_columns: Vec<String> = Vec::new();
        let mut feature_names_out = Vec::new();

        for transformer in spec.transformers {
            let compiled = match transformer {
                TransformerSpec::Passthrough { name, columns } => {
                    feature_names_out.extend(columns.iter().map(|c| format!("{}__{}", name, c)));
                    Transformer::Numeric {
                        columns,
                        mean: None,
                        scale: None,
                    }
                }
                TransformerSpec::StandardScaler {
                    name,
                    columns,
                    mean,
                    scale,
                } => {
                    if mean.len() != columns.len() || scale.len() != columns.len() {
                        return Err(invalid(format!(
                            "scaler '{}' has {} columns but {} means and {} scales",
                            name,
                            columns.len(),
                            mean.len(),
                            scale.len()
                        )));
                    }
                    // A zero scale means a constant column at fit time; it is
                    // left unscaled.
                    let scale: Vec<f64> = scale
                        .into_iter()
                        .map(|s| if s == 0.0 { 1.0 } else { s })
                        .collect();
                    if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
                        return Err(invalid(format!("scaler '{}' has non-finite parameters", name)));
                    }
                    feature_names_out.extend(columns.iter().map(|c| format!("{}__{}", name, c)));
                    Transformer::Numeric {
                        columns,
                        mean: Some(Array1::from_vec(mean)),
                        scale: Some(Array1::from_vec(scale)),
                    }
                }
                TransformerSpec::OneHot {
                    name,
                    columns,
                    categories,
                    handle_unknown,
                } => {
                    if categories.len() != columns.len() {
                        return Err(invalid(format!(
                            "one-hot '{}' has {} columns but {} category lists",
                            name,
                            columns.len(),
                            categories.len()
                        )));
                    }
                    for (column, cats) in columns.iter().zip(&categories) {
                        if cats.is_empty() {
                            return Err(invalid(format!("column '{}' has no categories", column)));
                        }
                        feature_names_out
                            .extend(cats.iter().map(|cat| format!("{}__{}_{}", name, column, cat)));
                    }
                    Transformer::OneHot {
                        columns,
                        categories,
                        handle_unknown,
                    }
                }
            };

            let columns = match &compiled {
                Transformer::Numeric { columns, .. } | Transformer::OneHot { columns, .. } => columns,
            };
            for column in columns {
                if input_columns.contains(column) {
                    return Err(invalid(format!("column '{}' is transformed twice", column)));
                }
                input_columns.push(column.clone());
            }
            transformers.push(compiled);
        }

        Ok(Self {
            transformers,
            input_columns,
            feature_names_out,
        })
    }

    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    pub fn feature_names_out(&self) -> &[String] {
        &self.feature_names_out
    }

    pub fn output_width(&self) -> usize {
        self.transformers.iter().map(Transformer::width).sum()
    }

    pub fn transform(&self, record: &Record) -> Result<Array1<f64>, ModelError> {
        let mut out = Vec::with_capacity(self.output_width());

        for transformer in &self.transformers {
            match transformer {
                Transformer::Numeric {
                    columns,
                    mean,
                    scale,
                } => {
                    let raw = numeric_columns(record, columns)?;
                    let scaled = match (mean, scale) {
                        (Some(mean), Some(scale)) => (&raw - mean) / scale,
                        _ => raw,
                    };
                    out.extend(scaled.iter().copied());
                }
                Transformer::OneHot {
                    columns,
                    categories,
                    handle_unknown,
                } => {
                    for (column, cats) in columns.iter().zip(categories) {
                        let label = record
                            .get(column)
                            .ok_or_else(|| ModelError::MissingColumn(column.clone()))?
                            .category_label();
                        let hit = cats.iter().position(|cat| *cat == label);
                        if hit.is_none() && *handle_unknown == HandleUnknown::Error {
                            return Err(ModelError::UnknownCategory {
                                column: column.clone(),
                                value: label,
                            });
                        }
                        out.extend((0..cats.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
                    }
                }
            }
        }

        Ok(Array1::from_vec(out))
    }
}

/// Reads `columns` from `record` in order, requiring finite numbers.
pub fn numeric_columns(record: &Record, columns: &[String]) -> Result<Array1<f64>, ModelError> {
    columns
        .iter()
        .map(|column| match record.get(column) {
            Some(Cell::Number(n)) if n.is_finite() => Ok(*n),
            Some(Cell::Number(_)) => Err(ModelError::NonFinite(column.clone())),
            Some(Cell::Text(_)) => Err(ModelError::ColumnType {
                column: column.clone(),
                expected: "a number",
            }),
            None => Err(ModelError::MissingColumn(column.clone())),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Array1::from_vec)
}

/// Rejects NaN and infinities in an already-numeric row.
pub fn ensure_finite(x: ArrayView1<'_, f64>, names: &[String]) -> Result<(), ModelError> {
    match x.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(ModelError::NonFinite(
            names.get(idx).cloned().unwrap_or_else(|| format!("x{}", idx)),
        )),
        None => Ok(()),
    }
}

fn invalid(msg: impl Into<String>) -> ModelError {
    ModelError::InvalidArtifact(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> PreprocessorSpec {
        serde_json::from_value(json!({
            "transformers": [
                { "kind": "standard_scaler", "columns": ["a", "b"], "mean": [1.0, 10.0], "scale": [2.0, 0.0] },
                { "kind": "one_hot", "columns": ["regimen"], "categories": [["Basal", "Premix"]] }
            ]
        }))
        .expect("spec parses")
    }

    #[test]
    fn transform_scales_and_encodes() {
        let pre = Preprocessor::compile(spec()).expect("compiles");
        let record = Record::new()
            .with_number("a", 5.0)
            .with_number("b", 12.0)
            .with_text("regimen", "Premix");

        let out = pre.transform(&record).expect("transform");

        assert_eq!(out.to_vec(), vec![2.0, 2.0, 0.0, 1.0]);
        assert_eq!(
            pre.feature_names_out(),
            &["num__a", "num__b", "cat__regimen_Basal", "cat__regimen_Premix"]
        );
        assert_eq!(pre.input_columns(), &["a", "b", "regimen"]);
    }

    #[test]
    fn unknown_category_is_an_input_error() {
        let pre = Preprocessor::compile(spec()).expect("compiles");
        let record = Record::new()
            .with_number("a", 1.0)
            .with_number("b", 1.0)
            .with_text("regimen", "Pump");

        let err = pre.transform(&record).expect_err("unknown category");
        assert!(matches!(err, ModelError::UnknownCategory { .. }));
        assert!(err.is_input_error());
    }

    #[test]
    fn ignore_mode_emits_zero_block() {
        let pre = Preprocessor::compile(PreprocessorSpec {
            transformers: vec![TransformerSpec::OneHot {
                name: "cat".into(),
                columns: vec!["regimen".into()],
                categories: vec![vec!["Basal".into()]],
                handle_unknown: HandleUnknown::Ignore,
            }],
        })
        .expect("compiles");
        let out = pre
            .transform(&Record::new().with_text("regimen", "Pump"))
            .expect("ignored");
        assert_eq!(out.to_vec(), vec![0.0]);
    }

    #[test]
    fn missing_and_mistyped_columns_are_reported() {
        let pre = Preprocessor::compile(spec()).expect("compiles");
        let missing = pre
            .transform(&Record::new().with_number("a", 1.0))
            .expect_err("b missing");
        assert!(matches!(missing, ModelError::MissingColumn(ref c) if c == "b"));

        let mistyped = pre
            .transform(&Record::new().with_text("a", "x").with_number("b", 1.0))
            .expect_err("a is text");
        assert!(matches!(mistyped, ModelError::ColumnType { .. }));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = Preprocessor::compile(PreprocessorSpec {
            transformers: vec![
                TransformerSpec::Passthrough {
                    name: "num".into(),
                    columns: vec!["a".into()],
                },
                TransformerSpec::Passthrough {
                    name: "rest".into(),
                    columns: vec!["a".into()],
                },
            ],
        })
        .expect_err("duplicate");
        assert!(matches!(err, ModelError::InvalidArtifact(_)));
    }
}
