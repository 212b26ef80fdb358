// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-completions model that answers with images embedded in its reply.

use async_trait::async_trait;
use pictor_core::{AdapterType, HealthStatus, ImageFile, ImageProvider, PictorError, PluginAdapter};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::extract::extract_image_urls;
use crate::http::JsonEndpoint;
use crate::image::{data_url, truncate_for_log};

/// Chat-render provider bound to one channel.
#[derive(Debug)]
pub struct ChatRenderProvider {
    name: String,
    endpoint: JsonEndpoint,
    model: String,
}

impl ChatRenderProvider {
    pub fn new(name: impl Into<String>, endpoint: JsonEndpoint, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint,
            model: model.into(),
        }
    }

    /// One user message: the prompt as a text part, then each image as an
    /// `image_url` part.
    pub fn request_body(&self, prompt: &str, images: &[ImageFile]) -> Value {
        let mut content = Vec::with_capacity(images.len() + 1);
        if !prompt.is_empty() {
            content.push(json!({"type": "text", "text": prompt}));
        }
        for image in images {
            content.push(json!({"type": "image_url", "image_url": {"url": data_url(image)}}));
        }
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": content}],
        })
    }
}

/// Collect image URLs from `choices[0].message.content`, which may be a
/// string or a list of typed parts. Returns the URLs and the reply text.
pub fn images_from_reply(body: &Value) -> (Vec<String>, String) {
    let content = body
        .pointer("/choices/0/message/content")
        .cloned()
        .unwrap_or(Value::Null);

    let mut urls = Vec::new();
    let mut text = String::new();
    match content {
        Value::String(s) => {
            urls.extend(extract_image_urls(&s));
            text = s;
        }
        Value::Array(parts) => {
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("image_url") => {
                        let url = part
                            .pointer("/image_url/url")
                            .or_else(|| part.get("image_url"))
                            .and_then(Value::as_str);
                        if let Some(url) = url {
                            urls.push(url.to_string());
                        }
                    }
                    Some("text") => {
                        if let Some(t) = part.get("text").and_then(Value::as_str) {
                            urls.extend(extract_image_urls(t));
                            text.push_str(t);
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }

    let mut unique: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        if !unique.contains(&url) {
            unique.push(url);
        }
    }
    (unique, text)
}

#[async_trait]
impl PluginAdapter for ChatRenderProvider {
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
impl ImageProvider for ChatRenderProvider {
    async fn generate(
        &self,
        prompt: &str,
        images: &[ImageFile],
    ) -> Result<Vec<String>, PictorError> {
        info!(
            channel = %self.name,
            model = %self.model,
            prompt = %truncate_for_log(prompt, 100),
            images = images.len(),
            "sending chat render request"
        );

        let response = self.endpoint.post(&self.request_body(prompt, images)).await?;
        let body: Value = response.json().await.map_err(|e| PictorError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let (urls, text) = images_from_reply(&body);
        if urls.is_empty() {
            warn!(channel = %self.name, reply = %truncate_for_log(&text, 200), "model reply contained no image");
            return Err(PictorError::provider(format!(
                "model reply contained no image: {}",
                truncate_for_log(text.trim(), 200)
            )));
        }
        info!(channel = %self.name, count = urls.len(), "chat render returned images");
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(url: &str) -> ChatRenderProvider {
        let endpoint = JsonEndpoint::new(url, None, Duration::from_secs(5), 0).unwrap();
        ChatRenderProvider::new("render", endpoint, "painter-1")
    }

    fn reply(content: Value) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[test]
    fn body_has_text_then_image_parts() {
        let p = provider("http://localhost/");
        let image = ImageFile::new(vec![1, 2, 3], "image/jpeg", "a.jpg");
        let body = p.request_body("paint it", &[image]);
        let content = &body["messages"][0]["content"];
        assert_eq!(body["model"], "painter-1");
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "paint it");
        assert_eq!(content[1]["type"], "image_url");
        assert!(
            content[1]["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/jpeg;base64,")
        );
    }

    #[test]
    fn structured_parts_are_accepted() {
        let body = reply(json!([
            {"type": "text", "text": "done ![a](https://x/1.png)"},
            {"type": "image_url", "image_url": {"url": "https://x/2.png"}},
            {"type": "image_url", "image_url": {"url": "https://x/1.png"}}
        ]));
        let (urls, text) = images_from_reply(&body);
        assert_eq!(urls, vec!["https://x/1.png", "https://x/2.png"]);
        assert!(text.starts_with("done"));
    }

    #[tokio::test]
    async fn generate_extracts_urls_from_reply_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"model": "painter-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(json!(
                "Here you go <img src=\"https://x/out.png\"/>"
            ))))
            .mount(&server)
            .await;

        let urls = provider(&server.uri()).generate("a cat", &[]).await.unwrap();
        assert_eq!(urls, vec!["https://x/out.png"]);
    }

    #[tokio::test]
    async fn reply_without_image_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(reply(json!("I can't draw that."))),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri()).generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, PictorError::Provider { .. }));
        assert!(err.to_string().contains("I can't draw that."), "{err}");
    }

    #[tokio::test]
    async fn http_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"type": "unauthorized"}})),
            )
            .mount(&server)
            .await;

        let err = provider(&server.uri()).generate("x", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "provider error: unauthorized");
    }
}
