use crate::config::{GeminiConfig, PromptsConfig};
use crate::models::CompressionLevel;
use crate::services::prompt;
use crate::services::transformer::{ChunkResult, RemoteError, TextTransformer};
use crate::utils::limiters::Limiters;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Value shipped in the sample .env; treated as "not configured".
pub const PLACEHOLDER_API_KEY: &str = "your_key_here";

/// Gemini `generateContent` client. Built once at startup and shared.
#[derive(Clone)]
pub struct GeminiService {
    client: Client,
    config: GeminiConfig,
    prompts: PromptsConfig,
    limiters: Arc<Limiters>,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

// Response Structures
#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl GeminiService {
    pub fn new(
        config: GeminiConfig,
        prompts: PromptsConfig,
        limiters: Arc<Limiters>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            prompts,
            limiters,
        })
    }

    /// Build the client and check its credentials. Startup goes through here,
    /// so the server never binds with a missing or rejected key.
    pub async fn connect(
        config: GeminiConfig,
        prompts: PromptsConfig,
        limiters: Arc<Limiters>,
    ) -> Result<Self> {
        let service = Self::new(config, prompts, limiters)?;
        service
            .validate_credentials()
            .await
            .context("Gemini API key validation failed")?;
        Ok(service)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send one prompt and return the raw model answer.
    pub async fn generate(&self, prompt: String) -> Result<String, RemoteError> {
        let (_permit, waited) = Limiters::acquire_timed(
            self.limiters.gemini.clone(),
            self.limiters.acquire_timeout,
            "gemini_generate",
        )
        .await
        .map_err(|e| RemoteError::RateLimited(e.to_string()))?;

        if waited > Duration::from_millis(100) {
            debug!("Waited {:?} for a Gemini slot", waited);
        }

        let request = GenerateContentRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, body);
            error!("Gemini call failed after {:.2?}: {}", started.elapsed(), err);
            return Err(err);
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout(format!("Gemini response body: {}", e))
            } else {
                RemoteError::Malformed(format!("Failed to parse Gemini response: {}", e))
            }
        })?;

        let finish_reason = body
            .candidates
            .first()
            .and_then(|c| c.finish_reason.clone());
        let text = body.text().ok_or_else(|| {
            RemoteError::Malformed(format!(
                "Gemini returned no candidate text (finishReason={})",
                finish_reason.as_deref().unwrap_or("none")
            ))
        })?;

        if finish_reason.as_deref() == Some("MAX_TOKENS") {
            warn!("Gemini output truncated at maxOutputTokens={}", self.config.max_output_tokens);
        }

        debug!(
            "Gemini responded in {:.2}s, {} chars",
            started.elapsed().as_secs_f64(),
            text.len()
        );

        Ok(text)
    }

    /// Startup check: the key must be set and accepted by the API.
    pub async fn validate_credentials(&self) -> Result<(), RemoteError> {
        let key = self.config.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            return Err(RemoteError::Config(
                "GEMINI_API_KEY is not configured".to_string(),
            ));
        }

        self.generate("Hi".to_string()).await.map(|_| ())
    }
}

#[async_trait]
impl TextTransformer for GeminiService {
    async fn transform(
        &self,
        text: &str,
        level: CompressionLevel,
    ) -> Result<ChunkResult, RemoteError> {
        let prompt = prompt::build_prompt(&self.prompts, level, text);
        let raw = self.generate(prompt).await?;
        Ok(prompt::parse_response(&raw))
    }
}

fn classify_transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(format!("Gemini request: {}", e))
    } else {
        RemoteError::Generic(format!("Gemini network error: {}", e))
    }
}

fn classify_status(status: StatusCode, body: String) -> RemoteError {
    let detail = format!("Gemini API error ({}): {}", status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RemoteError::Timeout(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Config(detail),
        StatusCode::BAD_REQUEST if mentions_api_key(&body) => RemoteError::Config(detail),
        _ => RemoteError::Generic(detail),
    }
}

fn mentions_api_key(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("api key") || lower.contains("api_key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1beta/models/test-model:generateContent";

    fn service(server: &MockServer, api_key: &str) -> GeminiService {
        let config = GeminiConfig {
            api_key: api_key.to_string(),
            base_url: server.uri(),
            model: "test-model".to_string(),
            timeout_seconds: 5,
            ..GeminiConfig::default()
        };
        let limiters = Arc::new(Limiters::new(&config));
        GeminiService::new(config, PromptsConfig::default(), limiters).unwrap()
    }

    fn answer(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn test_transform_parses_sections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(json!({
                "generationConfig": { "maxOutputTokens": 8192 }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(answer("SUMMARY: Short.\nOPTIMIZED: Body text.")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = service(&server, "secret")
            .transform("Some long input.", CompressionLevel::Balanced)
            .await
            .unwrap();

        assert_eq!(result.summary, "Short.");
        assert_eq!(result.optimized_content, "Body text.");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases: [(u16, &str, &str); 7] = [
            (429, "quota", "rate"),
            (408, "slow", "timeout"),
            (504, "slow", "timeout"),
            (403, "denied", "config"),
            (400, "API key not valid. Please pass a valid API key.", "config"),
            (400, "bad request", "generic"),
            (500, "boom", "generic"),
        ];

        for (status, body, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(MODEL_PATH))
                .respond_with(ResponseTemplate::new(status).set_body_string(body))
                .mount(&server)
                .await;

            let err = service(&server, "k")
                .transform("text.", CompressionLevel::Minimal)
                .await
                .unwrap_err();

            let kind = match err {
                RemoteError::RateLimited(_) => "rate",
                RemoteError::Timeout(_) => "timeout",
                RemoteError::Config(_) => "config",
                RemoteError::Generic(_) => "generic",
                RemoteError::Malformed(_) => "malformed",
            };
            assert_eq!(kind, expected, "status {} body {:?}", status, body);
        }
    }

    #[tokio::test]
    async fn test_empty_candidates_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = service(&server, "k").generate("x".into()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_validate_rejects_missing_or_placeholder_key() {
        let server = MockServer::start().await;
        for key in ["", "   ", PLACEHOLDER_API_KEY] {
            let err = service(&server, key).validate_credentials().await.unwrap_err();
            assert!(matches!(err, RemoteError::Config(_)));
        }
        // No request may reach the API without a key
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_sends_test_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Hi" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("Hello!")))
            .expect(1)
            .mount(&server)
            .await;

        assert!(service(&server, "valid").validate_credentials().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_requires_working_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "valid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("Hello!")))
            .expect(1)
            .mount(&server)
            .await;

        let connect = |key: &str| {
            let config = GeminiConfig {
                api_key: key.to_string(),
                base_url: server.uri(),
                model: "test-model".to_string(),
                ..GeminiConfig::default()
            };
            let limiters = Arc::new(Limiters::new(&config));
            GeminiService::connect(config, PromptsConfig::default(), limiters)
        };

        assert!(connect(PLACEHOLDER_API_KEY).await.is_err());
        assert!(connect("").await.is_err());
        assert!(connect("valid").await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_surfaces_rejected_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("API_KEY_INVALID"))
            .mount(&server)
            .await;

        let err = service(&server, "bad").validate_credentials().await.unwrap_err();
        assert!(matches!(err, RemoteError::Config(_)));
    }
}
