//! Local inference through an Ollama server.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extractor::{Extractor, ExtractorError, backend_error, trim_base_url};
use crate::prompt::build_prompt;

pub const DEFAULT_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:latest";

/// Extractor backed by Ollama's `/api/generate` endpoint.
pub struct OllamaExtractor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaExtractor {
    /// Create a client for the Ollama server at `base_url`
    /// (like `http://localhost:11434`, trailing slash optional).
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: trim_base_url(base_url),
            model: model.into(),
            temperature: 0.0,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl Extractor for OllamaExtractor {
    fn model(&self) -> &str {
        &self.model
    }

    async fn extract(&self, document_text: &str) -> Result<String, ExtractorError> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = build_prompt(document_text);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        debug!(url = %url, model = %self.model, "ollama generate request");
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(backend_error(resp).await);
        }

        let result: GenerateResponse = resp.json().await?;
        if result.response.trim().is_empty() {
            return Err(ExtractorError::EmptyResponse);
        }
        Ok(result.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;

    fn extractor(url: &str) -> OllamaExtractor {
        OllamaExtractor::new(url, DEFAULT_MODEL, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trims_trailing_slash() {
        let ollama = extractor("http://localhost:11434/");
        assert_eq!(ollama.base_url, "http://localhost:11434");
    }

    #[test]
    fn request_shape() {
        let body = GenerateRequest {
            model: "llama3.2:latest",
            prompt: "hello",
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.2:latest");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[tokio::test]
    async fn returns_generated_text() {
        let (url, request) =
            serve_once(200, r#"{"model":"llama3.2:latest","response":"[{\"year\":2023}]","done":true}"#)
                .await;
        let text = extractor(&url).extract("Car 4 exceeded track limits.").await.unwrap();
        assert_eq!(text, r#"[{"year":2023}]"#);

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /api/generate"));
        assert!(request.contains("Car 4 exceeded track limits."));
    }

    #[tokio::test]
    async fn server_error_is_backend_error() {
        let (url, _request) = serve_once(503, "model is loading").await;
        let err = extractor(&url).extract("text").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractorError::Backend { status: 503, ref body } if body == "model is loading"
        ));
    }

    #[tokio::test]
    async fn blank_response_is_empty() {
        let (url, _request) = serve_once(200, r#"{"response":"  ","done":true}"#).await;
        let err = extractor(&url).extract("text").await.unwrap_err();
        assert!(matches!(err, ExtractorError::EmptyResponse));
    }
}
