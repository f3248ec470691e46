use std::sync::Arc;

use serde::Serialize;

use super::error::ModelError;
use super::model::{TabularModel, Task};
use crate::core::config::settings::{ModelEntry, ModelSettings};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

/// Models loaded once at start-up and shared read-only by all handlers.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    pub hba1c: Option<Arc<TabularModel>>,
    pub risk: Option<Arc<TabularModel>>,
    pub therapy: Option<Arc<TabularModel>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub task: &'static str,
    pub n_features: usize,
    pub sha256: String,
}

impl ModelRegistry {
    pub fn load(settings: &ModelSettings, paths: &AppPaths) -> Result<Self, ModelError> {
        Ok(Self {
            hba1c: load_entry("hba1c", settings.hba1c.as_ref(), paths, Task::Regression)?,
            risk: load_entry("risk", settings.risk.as_ref(), paths, Task::Regression)?,
            therapy: load_entry(
                "therapy",
                settings.therapy.as_ref(),
                paths,
                Task::Classification,
            )?,
        })
    }

    pub fn hba1c(&self) -> Result<&TabularModel, ApiError> {
        require(&self.hba1c, "hba1c")
    }

    pub fn risk(&self) -> Result<&TabularModel, ApiError> {
        require(&self.risk, "risk")
    }

    pub fn therapy(&self) -> Result<&TabularModel, ApiError> {
        require(&self.therapy, "therapy")
    }

    pub fn summaries(&self) -> Vec<(&'static str, Option<ModelSummary>)> {
        [
            ("hba1c", &self.hba1c),
            ("risk", &self.risk),
            ("therapy", &self.therapy),
        ]
        .into_iter()
        .map(|(key, model)| {
            let summary = model.as_ref().map(|m| ModelSummary {
                name: m.name().to_string(),
                task: m.task().as_str(),
                n_features: m.n_features(),
                sha256: m.digest().to_string(),
            });
            (key, summary)
        })
        .collect()
    }
}

fn load_entry(
    key: &str,
    entry: Option<&ModelEntry>,
    paths: &AppPaths,
    expected_task: Task,
) -> Result<Option<Arc<TabularModel>>, ModelError> {
    let Some(entry) = entry else {
        tracing::warn!("No '{}' model configured; its endpoint is disabled", key);
        return Ok(None);
    };

    let path = paths.resolve(&entry.path);
    let model = TabularModel::load(&path, entry.sha256.as_deref())?;
    if model.task() != expected_task {
        return Err(ModelError::InvalidArtifact(format!(
            "'{}' model at {} is a {} model, expected {}",
            key,
            path.display(),
            model.task().as_str(),
            expected_task.as_str()
        )));
    }

    tracing::info!(
        model = key,
        path = %path.display(),
        sha256 = %model.digest(),
        n_features = model.n_features(),
        "Loaded model"
    );
    Ok(Some(Arc::new(model)))
}

fn require<'a>(
    model: &'a Option<Arc<TabularModel>>,
    key: &str,
) -> Result<&'a TabularModel, ApiError> {
    model
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable(format!("The '{}' model is not loaded", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn unconfigured_models_answer_service_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry =
            ModelRegistry::load(&ModelSettings::default(), &AppPaths::from_root(dir.path()))
                .expect("empty registry");
        assert!(matches!(
            registry.therapy(),
            Err(ApiError::ServiceUnavailable(_))
        ));
        assert!(registry.summaries().iter().all(|(_, s)| s.is_none()));
    }

    #[test]
    fn task_mismatch_fails_start_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("ridge.json"),
            r#"{"estimator":{"kind":"linear","coefficients":[1.0],"intercept":0.0}}"#,
        )
        .expect("write");
        let settings = ModelSettings {
            therapy: Some(ModelEntry {
                path: "ridge.json".into(),
                sha256: None,
            }),
            ..Default::default()
        };

        let result = ModelRegistry::load(&settings, &AppPaths::from_root(dir.path()));
        assert!(matches!(result, Err(ModelError::InvalidArtifact(_))));
    }
}
