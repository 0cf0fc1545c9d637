use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::AiClientError;
use crate::types::*;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const STRUCTURED_TOOL_NAME: &str = "structured_response";

/// Base delay for the exponential backoff on 429/5xx.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// A structured extraction together with its token accounting.
#[derive(Debug, Clone)]
pub struct Extraction<T> {
    pub value: T,
    pub usage: Usage,
}

/// Minimal Anthropic Messages API client for structured extraction.
///
/// Every call goes through a forced tool call whose input schema is derived
/// from the target type, so the response either deserializes or fails
/// loudly. Rate-limit and server errors are retried with exponential
/// backoff and jitter, honouring `retry-after`.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
    max_retries: u32,
    temperature: f32,
    max_output_tokens: u32,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            http: reqwest::Client::new(),
            max_retries: 3,
            temperature: 0.0,
            max_output_tokens: 1024,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Per-call deadline, enforced by the HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model to produce a `T` via a forced tool call.
    pub async fn extract<T: DeserializeOwned + JsonSchema>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<Extraction<T>, AiClientError> {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| AiClientError::InvalidResponse(format!("schema generation: {e}")))?;

        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .max_tokens(self.max_output_tokens)
            .temperature(self.temperature)
            .forced_tool(ToolDefinitionWire {
                name: STRUCTURED_TOOL_NAME.to_string(),
                description: "Report the structured comparison result.".to_string(),
                input_schema: schema,
            });

        let response = self.chat(&request).await?;
        let usage = response.usage.unwrap_or_default();

        let input = response.tool_input(STRUCTURED_TOOL_NAME).ok_or_else(|| {
            AiClientError::InvalidResponse("no structured tool call in response".to_string())
        })?;
        let value = serde_json::from_value(input.clone())
            .map_err(|e| AiClientError::InvalidResponse(format!("schema mismatch: {e}")))?;

        Ok(Extraction { value, usage })
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AiClientError> {
        let url = format!("{}/messages", self.base_url);

        let mut attempt = 0u32;
        loop {
            debug!(model = %request.model, attempt, "Claude chat request");

            let response =
                self.http.post(&url).headers(self.headers()?).json(request).send().await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }

            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let message = response.text().await.unwrap_or_default();

            if attempt >= self.max_retries || !AiClientError::is_retryable_status(status.as_u16()) {
                return Err(AiClientError::Api { status: status.as_u16(), message });
            }

            let delay = retry_after.unwrap_or_else(|| backoff_delay(attempt));
            warn!(status = status.as_u16(), attempt, delay_ms = delay.as_millis() as u64,
                "retrying Claude request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn headers(&self) -> Result<HeaderMap, AiClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| AiClientError::InvalidResponse("invalid api key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl std::fmt::Debug for Claude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claude")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Exponential backoff with clock-derived jitter (no RNG dependency).
fn backoff_delay(attempt: u32) -> Duration {
    let exponential = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
    let jitter_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()) % 250)
        .unwrap_or(0);
    exponential + Duration::from_millis(jitter_ms)
}
