// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HTTP plumbing: authenticated client, transient-error retry, and
//! API error message extraction.

use std::time::Duration;

use pictor_core::PictorError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::image::truncate_for_log;

/// JSON POST client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct JsonEndpoint {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl JsonEndpoint {
    /// Build a client for `url`, sending `Authorization: Bearer <key>` when a key is set.
    pub fn new(
        url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, PictorError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {}", key.trim())).map_err(|e| {
                    PictorError::Config(format!("invalid API key header value: {e}"))
                })?,
            );
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| PictorError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
            max_retries,
            retry_backoff: Duration::from_secs(1),
        })
    }

    /// Overrides the delay unit between retries (attempt `n` waits `n * backoff`).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body`, retrying transient statuses with a linear backoff.
    ///
    /// Returns the first successful response. Any other final status is
    /// turned into a [`PictorError::Provider`] built from the error body.
    pub async fn post(&self, body: &Value) -> Result<reqwest::Response, PictorError> {
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, url = %self.url, "retrying request after transient error");
                tokio::time::sleep(self.retry_backoff * attempt).await;
            }

            let response = self
                .client
                .post(&self.url)
                .json(body)
                .send()
                .await
                .map_err(|e| PictorError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "provider response received");

            if status.is_success() {
                return Ok(response);
            }

            let text = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %truncate_for_log(&text, 200), "transient error, will retry");
                continue;
            }
            return Err(PictorError::provider(api_error_message(status.as_u16(), &text)));
        }

        Err(PictorError::provider("request failed after retries"))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
pub fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

/// Message for a failed call: `error.message`, else `error.type`, else
/// `error.code`, else the bare status.
pub fn api_error_message(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let field = |name: &str| -> Option<String> {
        match error?.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };
    field("message")
        .or_else(|| field("type"))
        .or_else(|| field("code"))
        .unwrap_or_else(|| format!("HTTP error! status: {status}"))
}
