use std::path::PathBuf;

use thiserror::Error;

use crate::core::errors::ApiError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode model artifact {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("expected {expected} features, got {actual}")]
    Arity { expected: usize, actual: usize },
    #[error("missing value for column '{0}'")]
    MissingColumn(String),
    #[error("column '{column}' expects {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },
    #[error("found unknown category '{value}' in column '{column}' during transform")]
    UnknownCategory { column: String, value: String },
    #[error("non-finite value for feature '{0}'")]
    NonFinite(String),
    #[error("{0} is not a finite number for these inputs")]
    NonFiniteOutput(&'static str),
    #[error("{operation} is not supported by a {task} model")]
    UnsupportedTask {
        operation: &'static str,
        task: &'static str,
    },
    #[error("model requires named columns; use a structured record")]
    RecordRequired,
}

impl ModelError {
    /// Errors caused by the caller's input rather than by the artifact.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ModelError::Arity { .. }
                | ModelError::MissingColumn(_)
                | ModelError::ColumnType { .. }
                | ModelError::UnknownCategory { .. }
                | ModelError::NonFinite(_)
                | ModelError::NonFiniteOutput(_)
        )
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        if err.is_input_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::internal(err)
        }
    }
}
