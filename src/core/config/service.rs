use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

/// Secrets and deployment knobs that may come from the environment. They win
/// over both YAML files.
const ENV_OVERRIDES: [(&str, &[&str]); 8] = [
    ("PINECONE_API_KEY", &["vector_index", "api_key"]),
    ("PINECONE_INDEX_HOST", &["vector_index", "host"]),
    ("LLM_API_KEY", &["llm", "api_key"]),
    ("GROQ_API_KEY", &["llm", "api_key"]),
    ("LLM_BASE_URL", &["llm", "base_url"]),
    ("EMBEDDING_API_KEY", &["embedding", "api_key"]),
    ("EMBEDDING_BASE_URL", &["embedding", "base_url"]),
    ("HOST", &["server", "host"]),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("DIACARE_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config deep-merged with the secrets file, then environment
    /// overrides applied on top.
    pub fn load_config(&self) -> Result<Value, ConfigError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |key| env::var(key).ok());
        Ok(merged)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(config: Value) -> Result<Settings, ConfigError> {
    validate_config(&config)?;
    Ok(serde_json::from_value(config)?)
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Invalid(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (var, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(var) else {
            continue;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        // LLM_API_KEY takes precedence over the provider specific name.
        if var == "GROQ_API_KEY" && lookup("LLM_API_KEY").is_some_and(|v| !v.trim().is_empty()) {
            continue;
        }
        ensure_object_path(config, path, Value::String(trimmed.to_string()));
    }

    if let Some(port) = lookup("PORT").and_then(|val| val.trim().parse::<u16>().ok()) {
        ensure_object_path(config, &["server", "port"], Value::from(port));
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn deep_merge_overlays_secrets_onto_public_config() {
        let public = json!({
            "llm": { "model": "m", "temperature": 0.7 },
            "vector_index": { "host": "https://idx" }
        });
        let secrets = json!({
            "llm": { "api_key": "k1" },
            "vector_index": { "api_key": "k2" }
        });

        let merged = deep_merge(&public, &secrets);

        assert_eq!(
            merged,
            json!({
                "llm": { "model": "m", "temperature": 0.7, "api_key": "k1" },
                "vector_index": { "host": "https://idx", "api_key": "k2" }
            })
        );
    }

    #[test]
    fn env_overrides_win_and_llm_key_beats_groq_key() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PINECONE_API_KEY", "pc"),
            ("GROQ_API_KEY", "groq"),
            ("LLM_API_KEY", "llm"),
            ("PORT", "9100"),
        ]);
        let mut config = json!({ "llm": { "api_key": "from-file" } });

        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config["llm"]["api_key"], "llm");
        assert_eq!(config["vector_index"]["api_key"], "pc");
        assert_eq!(config["server"]["port"], 9100);
    }

    #[test]
    fn groq_key_used_when_generic_key_missing() {
        let mut config = json!({});
        apply_env_overrides(&mut config, |key| {
            (key == "GROQ_API_KEY").then(|| "groq".to_string())
        });
        assert_eq!(config["llm"]["api_key"], "groq");
    }

    #[test]
    fn redact_hides_keys_but_keeps_token_limits() {
        let input = json!({
            "llm": { "api_key": "secret", "max_tokens": 512 },
            "vector_index": { "api_key": null, "top_k": 3 }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "llm": { "api_key": "****", "max_tokens": 512 },
                "vector_index": { "api_key": null, "top_k": 3 }
            })
        );
    }

    #[test]
    fn load_config_reads_both_yaml_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("config.yml"),
            "models:\n  hba1c:\n    path: ridge.json\nvector_index:\n  top_k: 2\n",
        )
        .expect("write config");
        fs::write(dir.path().join("secrets.yaml"), "llm:\n  api_key: abc\n")
            .expect("write secrets");

        let service = ConfigService::new(Arc::new(AppPaths::from_root(dir.path())));
        let config = service.load_config().expect("config loads");
        let settings = settings_from_value(config).expect("settings parse");

        assert_eq!(settings.vector_index.top_k, 2);
        assert_eq!(
            settings.models.hba1c.as_ref().map(|m| m.path.as_str()),
            Some("ridge.json")
        );
        assert!(settings.models.therapy.is_none());
        assert!(settings.llm_configured());
    }

    #[test]
    fn malformed_yaml_is_reported_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("config.yml"), "llm: [unterminated").expect("write");
        let service = ConfigService::new(Arc::new(AppPaths::from_root(dir.path())));

        let err = service.load_config().expect_err("yaml is malformed");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
