use std::{fmt, future::Future, pin::Pin, time::Duration};

use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    config::LlmConfig,
    error::{PlannerError, Result},
};

const MAX_RETRIES: usize = 3;
const SYSTEM_PROMPT: &str =
    "You are a travel planning assistant. Respond with a single JSON object and no prose.";

/// Boxed future returned by [`TextGenerator::generate`].
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Opaque "prompt in, text out" capability used by the agents.
pub trait TextGenerator: Send + Sync + fmt::Debug {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a>;
}

/// OpenAI-compatible chat completions client.
///
/// Retries 429 responses (honouring `Retry-After`) and 5xx responses with
/// exponential backoff, up to three times.
#[derive(Clone, Debug)]
pub struct ChatGenerator {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl ChatGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PlannerError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat_completion(&self, body: &Value) -> Result<Value> {
        let mut attempt = 0;
        let mut backoff = Duration::from_millis(250);
        let request_url = build_chat_url(&self.base_url);

        loop {
            let response = self
                .client
                .post(&request_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .header("X-Title", "travel-buddy-rs")
                .json(body)
                .send()
                .await
                .map_err(|err| PlannerError::Generation(format!("HTTP request failed: {err}")))?;

            let status = response.status();
            let headers = response.headers().clone();
            let response_text = response.text().await.map_err(|err| {
                PlannerError::Generation(format!("Failed to read response: {err}"))
            })?;

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_duration = headers
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(backoff);

                if attempt < MAX_RETRIES {
                    debug!(target: "travel_buddy::llm", attempt, "rate limited, retrying");
                    tokio::time::sleep(retry_after_duration).await;
                    attempt += 1;
                    backoff *= 2;
                    continue;
                }

                return Err(PlannerError::RateLimit {
                    retry_after: retry_after_duration.as_secs().max(1),
                });
            }

            if status.is_server_error() && attempt < MAX_RETRIES {
                debug!(target: "travel_buddy::llm", attempt, %status, "server error, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                backoff *= 2;
                continue;
            }

            let response_json: Value = serde_json::from_str(&response_text)
                .map_err(|err| PlannerError::Generation(format!("Failed to parse JSON: {err}")))?;

            if !status.is_success() {
                let api_message = response_json
                    .get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or(response_text);

                return Err(PlannerError::Generation(format!(
                    "HTTP {} error: {}",
                    status, api_message
                )));
            }

            if let Some(error) = response_json.get("error") {
                let error_message = error
                    .get("message")
                    .and_then(|value| value.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| error.to_string());
                return Err(PlannerError::Generation(format!(
                    "API error: {}",
                    error_message
                )));
            }

            return Ok(response_json);
        }
    }
}

impl TextGenerator for ChatGenerator {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            let body = ChatCompletionRequest::new(
                self.model.clone(),
                vec![
                    json!({"role": "system", "content": SYSTEM_PROMPT}),
                    json!({"role": "user", "content": prompt}),
                ],
            )
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_response_format(json!({"type": "json_object"}))
            .into_value();

            let response = self.chat_completion(&body).await?;
            response
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    PlannerError::Generation("completion response has no message content".into())
                })
        })
    }
}

fn build_chat_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

#[derive(Clone, Debug)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    response_format: Option<Value>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            response_format: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_response_format(mut self, response_format: Value) -> Self {
        self.response_format = Some(response_format);
        self
    }

    pub fn into_value(self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        if let Some(response_format) = self.response_format {
            body["response_format"] = response_format;
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::Server) -> LlmConfig {
        let mut config = LlmConfig::new("test-key");
        config.base_url = server.url();
        config
    }

    #[test]
    fn test_build_chat_url() {
        assert_eq!(
            build_chat_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            build_chat_url("https://api.example.com/v1/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_body_omits_unset_fields() {
        let body = ChatCompletionRequest::new("m", vec![json!({"role": "user", "content": "hi"})])
            .into_value();
        assert_eq!(body["model"], "m");
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("response_format").is_none());

        let body = ChatCompletionRequest::new("m", Vec::new())
            .with_max_tokens(Some(64))
            .with_temperature(Some(0.5))
            .into_value();
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.5);
    }

    #[tokio::test]
    async fn test_generate_returns_message_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let generator = ChatGenerator::new(&config_for(&server)).unwrap();
        let text = generator.generate("plan something").await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_configured_temperature_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(
                json!({"temperature": 0.25, "max_tokens": 2000}),
            ))
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "{}"}}]}).to_string(),
            )
            .create_async()
            .await;

        let mut config = config_for(&server);
        config.temperature = Some(0.25);
        let generator = ChatGenerator::new(&config).unwrap();
        generator.generate("cool it down").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body(json!({"error": {"message": "overloaded"}}).to_string())
            .expect(MAX_RETRIES + 1)
            .create_async()
            .await;

        let generator = ChatGenerator::new(&config_for(&server)).unwrap();
        let err = generator.generate("retry me").await.unwrap_err();

        failing.assert_async().await;
        assert!(matches!(err, PlannerError::Generation(ref msg) if msg.contains("overloaded")));
    }

    #[tokio::test]
    async fn test_client_errors_surface_api_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(400)
            .with_body(json!({"error": {"message": "bad model"}}).to_string())
            .create_async()
            .await;

        let generator = ChatGenerator::new(&config_for(&server)).unwrap();
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, PlannerError::Generation(ref msg) if msg.contains("bad model")));
    }
}
