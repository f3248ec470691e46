use thiserror::Error;

use crate::core::config::ConfigError;
use crate::predict::ModelError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load prediction models: {0}")]
    Models(#[from] ModelError),

    #[error("Failed to build HTTP client for {service}: {source}")]
    HttpClient {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl InitializationError {
    pub(crate) fn http_client(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| InitializationError::HttpClient { service, source }
    }
}
