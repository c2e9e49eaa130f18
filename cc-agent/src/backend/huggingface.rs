//! Hugging Face Inference API backend.
//!
//! Used for the calibrated forecaster. The text-generation endpoint takes a
//! single flattened prompt and answers with `[{"generated_text": ...}]`.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::http_client;
use super::traits::*;

/// Hugging Face text-generation backend.
pub struct HuggingFaceBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
    model: String,
}

impl HuggingFaceBackend {
    /// Create a new backend for `model` served under `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            model: model.into(),
        })
    }

    fn model_url(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest {
    inputs: String,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    do_sample: bool,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Batch(Vec<Generated>),
    Single(Generated),
}

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: String,
}

#[async_trait]
impl LlmBackend for HuggingFaceBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| LlmError::Unavailable("Hugging Face token not configured".to_string()))?;

        let body = GenerationRequest {
            inputs: request.flattened_prompt(),
            parameters: GenerationParameters {
                max_new_tokens: request.max_tokens,
                temperature: request.temperature,
                do_sample: request.temperature.map(|t| t > 0.0).unwrap_or(true),
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(self.model_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited { retry_after_ms: None });
            }
            // 503 while the model is loading
            if status.as_u16() == 503 {
                return Err(LlmError::Unavailable(format!("Model loading: {}", text)));
            }

            return Err(LlmError::RequestFailed(format!("HTTP {}: {}", status, text)));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content = match parsed {
            GenerationResponse::Batch(items) => items
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .ok_or_else(|| LlmError::ParseError("Empty generation batch".to_string()))?,
            GenerationResponse::Single(g) => g.generated_text,
        };

        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generation_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/org/forecaster"))
            .and(header_eq("authorization", "Bearer hf_abc"))
            .and(body_partial_json(serde_json::json!({
                "parameters": {
                    "max_new_tokens": 1024,
                    "return_full_text": false
                }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "generated_text": "0.62" }])),
            )
            .mount(&server)
            .await;

        let backend = HuggingFaceBackend::new(
            format!("{}/models", server.uri()),
            "org/forecaster",
            Some("hf_abc".into()),
        )
        .unwrap();
        let response = backend
            .complete(
                CompletionRequest::user("Will it work?")
                    .with_max_tokens(1024)
                    .with_temperature(0.3),
            )
            .await
            .unwrap();

        assert_eq!(response.content, "0.62");
    }

    #[tokio::test]
    async fn test_model_loading_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
            .mount(&server)
            .await;

        let backend =
            HuggingFaceBackend::new(server.uri(), "org/forecaster", Some("hf".into())).unwrap();
        let result = backend.complete(CompletionRequest::user("x")).await;
        assert!(matches!(result, Err(LlmError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let backend = HuggingFaceBackend::new("http://localhost:1", "m", Some("  ".into())).unwrap();
        assert!(matches!(
            backend.complete(CompletionRequest::user("x")).await,
            Err(LlmError::Unavailable(_))
        ));
    }
}
