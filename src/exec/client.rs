use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serenity::prelude::TypeMapKey;
use thiserror::Error;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Failures talking to the execution sandbox, one variant per way the
/// response can disappoint so the command layer can phrase each one.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("the execution service answered with status {0}")]
    InvalidStatus(u16),
    #[error("the execution service did not answer with JSON (got '{0}')")]
    InvalidContentType(String),
    #[error("the execution service answered without any output")]
    NoOutput,
    #[error("could not reach the execution service: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct ExecRequest<'a> {
    language: &'a str,
    source: &'a str,
    args: &'a [String],
}

#[derive(Deserialize)]
struct ExecResponse {
    output: Option<String>,
}

/// Thin client for the sandboxed-execution HTTP API.
pub struct SandboxClient {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

pub struct SandboxKey;

impl TypeMapKey for SandboxKey {
    type Value = Arc<SandboxClient>;
}

impl SandboxClient {
    pub fn new(url: String, token: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed building http client");

        Self { http, url, token }
    }

    pub async fn execute(
        &self,
        language: &str,
        source: &str,
        args: &[String],
    ) -> Result<String, ExecError> {
        info!("Dispatching {language} source ({} bytes)", source.len());

        let mut request = self.http.post(&self.url).json(&ExecRequest {
            language,
            source,
            args,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if response.status() != StatusCode::OK {
            return Err(ExecError::InvalidStatus(response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("application/json") {
            return Err(ExecError::InvalidContentType(content_type));
        }

        let body = response
            .json::<ExecResponse>()
            .await
            .map_err(|_| ExecError::NoOutput)?;

        body.output.ok_or(ExecError::NoOutput)
    }
}
