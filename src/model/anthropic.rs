//! Anthropic Messages API client

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::retry::{classify_http_error, with_retry};
use super::{ModelClient, ModelConfig};
use crate::domain::{Config, PromptEnvelope};
use crate::error::{ModelError, ModelErrorKind};

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorFields {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Blocking client for `POST {base}/v1/messages`.
#[derive(Debug)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    api_version: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, config: &Config) -> Result<Self, ModelError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ModelError::permanent(None, format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: config.api_base_url.clone(),
            api_version: config.api_version.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn send_once(
        &self,
        envelope: &PromptEnvelope,
        config: &ModelConfig,
    ) -> Result<String, ModelError> {
        let payload = build_request(envelope, config);
        debug!(
            "POST {} model={} ~{} tokens",
            self.endpoint(),
            config.model,
            envelope.estimated_token_count
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&payload)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_response(&body)
    }
}

impl ModelClient for AnthropicClient {
    fn generate(
        &self,
        envelope: &PromptEnvelope,
        config: &ModelConfig,
    ) -> Result<String, ModelError> {
        with_retry(config.max_retries, config.retry_base_delay, || {
            self.send_once(envelope, config)
        })
    }
}

fn build_request<'a>(envelope: &'a PromptEnvelope, config: &'a ModelConfig) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system: &envelope.system_role,
        messages: vec![RequestMessage { role: "user", content: &envelope.body }],
    }
}

fn transport_error(err: reqwest::Error) -> ModelError {
    let status = err.status().map(|s| s.as_u16());
    let message = err.to_string();
    if err.is_builder() || err.is_decode() {
        ModelError::permanent(status, message)
    } else if err.is_timeout() || err.is_connect() || err.is_request() {
        ModelError::transient(status, message)
    } else {
        ModelError { kind: classify_http_error(status, &message), status, message }
    }
}

fn status_error(status: StatusCode, body: &str) -> ModelError {
    let message = parse_error_message(status, body);
    let kind = classify_http_error(Some(status.as_u16()), &message);
    ModelError { kind, status: Some(status.as_u16()), message }
}

fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            body.trim().to_string()
        }
    };
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(ErrorPayload { error: Some(fields) }) => match (fields.kind, fields.message) {
            (Some(kind), Some(message)) => format!("{kind}: {message}"),
            (None, Some(message)) => message,
            (Some(kind), None) => kind,
            (None, None) => fallback(),
        },
        _ => fallback(),
    }
}

fn parse_response(body: &str) -> Result<String, ModelError> {
    let response: MessagesResponse = serde_json::from_str(body).map_err(|e| ModelError {
        kind: ModelErrorKind::Permanent,
        status: None,
        message: format!("malformed response: {e}"),
    })?;

    if response.stop_reason.as_deref() == Some("max_tokens") {
        warn!("Response stopped at the max_tokens limit; output may be incomplete");
    }

    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(ModelError::permanent(None, "response contained no text"));
    }
    Ok(text)
}
