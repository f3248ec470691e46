//! Shared plumbing for calls to hosted services (embedding server, vector
//! index, chat-completion API).

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

/// Longest upstream error body echoed back in messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("{service} sent an unexpected response: {detail}")]
    Malformed {
        service: &'static str,
        detail: String,
    },
}

impl UpstreamError {
    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| UpstreamError::Transport { service, source }
    }

    pub fn malformed(service: &'static str, detail: impl Into<String>) -> Self {
        UpstreamError::Malformed {
            service,
            detail: detail.into(),
        }
    }
}

pub fn build_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Passes successful responses through and turns the rest into
/// [`UpstreamError::Status`] with a truncated body.
pub async fn check_status(service: &'static str, res: Response) -> Result<Response, UpstreamError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let mut body = res.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    Err(UpstreamError::Status {
        service,
        status,
        body,
    })
}
