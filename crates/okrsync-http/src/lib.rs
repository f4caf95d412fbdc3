//! HTTP client construction and JSON request utilities for okrsync.

use std::time::Duration;

use anyhow::Context;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

pub const CRATE_NAME: &str = "okrsync-http";

/// Response bodies longer than this are cut in error messages.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },
    #[error("graphql errors: {0}")]
    GraphQl(String),
    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => StatusCode::from_u16(*status).ok(),
            Self::Request(err) => err.status(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

/// Thin wrapper over `reqwest::Client` that sends one request at a time and
/// decodes JSON bodies. Nothing is retried.
#[derive(Debug, Clone)]
pub struct JsonHttpClient {
    client: reqwest::Client,
}

impl JsonHttpClient {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.client.patch(url)
    }

    /// Send `request`, fail on any non-success status, and decode the body as `T`.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let request = request.build()?;
        let span = info_span!("http_call", method = %request.method(), url = %request.url());

        async move {
            let resp = self.client.execute(request).await?;
            let resp = check_response(resp).await?;
            debug!(status = resp.status().as_u16(), "response received");
            decode_json(resp).await
        }
        .instrument(span)
        .await
    }
}

/// Turn a non-success response into [`TransportError::HttpStatus`], keeping a
/// prefix of the body for diagnostics.
pub async fn check_response(resp: Response) -> Result<Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::HttpStatus {
        status: status.as_u16(),
        url,
        body: clip(&body, ERROR_BODY_LIMIT),
    })
}

pub async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, TransportError> {
    let url = resp.url().to_string();
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source| TransportError::Decode { url, source })
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
