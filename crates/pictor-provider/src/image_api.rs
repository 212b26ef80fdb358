// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DALL·E-style image generation endpoint.
//!
//! Sends one JSON request per generation and accepts either a JSON body
//! (`data[].url` or `data[].b64_json`) or a raw `image/*` body.

use async_trait::async_trait;
use pictor_core::{AdapterType, HealthStatus, ImageFile, ImageProvider, PictorError, PluginAdapter};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::http::JsonEndpoint;
use crate::image::{b64_to_data_url, bytes_to_data_url, data_url, truncate_for_log};

/// Optional request parameters forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageApiParams {
    pub model: String,
    pub n: Option<u32>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
}

/// Image API provider bound to one channel.
#[derive(Debug)]
pub struct ImageApiProvider {
    name: String,
    endpoint: JsonEndpoint,
    params: ImageApiParams,
}

impl ImageApiProvider {
    pub fn new(name: impl Into<String>, endpoint: JsonEndpoint, params: ImageApiParams) -> Self {
        Self {
            name: name.into(),
            endpoint,
            params,
        }
    }

    /// Build the request body for one call.
    pub fn request_body(&self, prompt: &str, images: &[ImageFile]) -> Value {
        let mut body = Map::new();
        body.insert("prompt".into(), json!(prompt));
        body.insert("model".into(), json!(self.params.model));
        if let Some(n) = self.params.n {
            body.insert("n".into(), json!(n));
        }
        for (key, value) in [
            ("size", &self.params.size),
            ("quality", &self.params.quality),
            ("style", &self.params.style),
        ] {
            if let Some(value) = value {
                body.insert(key.into(), param_value(value));
            }
        }
        match images {
            [] => {}
            [single] => {
                body.insert("image".into(), json!(data_url(single)));
            }
            many => {
                let urls: Vec<String> = many.iter().map(data_url).collect();
                body.insert("image".into(), json!(urls));
            }
        }
        Value::Object(body)
    }
}

/// Numeric-looking strings are sent as JSON numbers.
fn param_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return json!(int);
    }
    match trimmed.parse::<f64>() {
        Ok(float) if float.is_finite() => json!(float),
        _ => json!(raw),
    }
}

/// Pull image URLs out of a JSON success body.
pub fn urls_from_json(body: &Value) -> Vec<String> {
    let Some(items) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            if let Some(url) = item.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()) {
                return Some(url.to_string());
            }
            item.get("b64_json")
                .and_then(Value::as_str)
                .filter(|b| !b.is_empty())
                .map(b64_to_data_url)
        })
        .collect()
}

#[async_trait]
impl PluginAdapter for ImageApiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, PictorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PictorError> {
        Ok(())
    }
}

#[async_trait]
impl ImageProvider for ImageApiProvider {
    async fn generate(
        &self,
        prompt: &str,
        images: &[ImageFile],
    ) -> Result<Vec<String>, PictorError> {
        let body = self.request_body(prompt, images);
        info!(
            channel = %self.name,
            url = %self.endpoint.url(),
            model = %self.params.model,
            prompt = %truncate_for_log(prompt, 100),
            images = images.len(),
            "sending image API request"
        );

        let response = self.endpoint.post(&body).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let urls = if content_type.contains("application/json") {
            let json: Value = response.json().await.map_err(|e| PictorError::Provider {
                message: format!("failed to parse API response: {e}"),
                source: Some(Box::new(e)),
            })?;
            urls_from_json(&json)
        } else if content_type.starts_with("image/") {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or("image/png")
                .trim()
                .to_string();
            let bytes = response.bytes().await.map_err(|e| PictorError::Provider {
                message: format!("failed to read image body: {e}"),
                source: Some(Box::new(e)),
            })?;
            vec![bytes_to_data_url(&mime, &bytes)]
        } else {
            return Err(PictorError::provider("unknown response format"));
        };

        if urls.is_empty() {
            return Err(PictorError::provider("provider returned no images"));
        }
        debug!(
            channel = %self.name,
            count = urls.len(),
            first = %truncate_for_log(&urls[0], 80),
            "image API returned images"
        );
        Ok(urls)
    }
}
