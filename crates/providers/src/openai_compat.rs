//! OpenAI-compatible reasoning service.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any other endpoint that
//! exposes `/chat/completions`. The system message carries the reply-format
//! instructions; the serialized request is sent as the user message.

use async_trait::async_trait;
use goalward_core::error::TransportError;
use goalward_core::reasoner::{Reasoner, RequestPayload};
use goalward_protocol::RESPONSE_INSTRUCTIONS;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Used when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatSettings {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenAiCompatSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatSettings")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "(empty)"
                } else {
                    "***"
                },
            )
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A reasoning service reached over an OpenAI-compatible chat API.
pub struct OpenAiCompatReasoner {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiCompatReasoner {
    pub fn new(settings: OpenAiCompatSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TransportError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: settings.name,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            model: settings.model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout_secs: settings.timeout.as_secs(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body<'a>(&'a self, request: &'a RequestPayload) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: RESPONSE_INSTRUCTIONS,
                },
                ChatMessage {
                    role: "user",
                    content: request.as_str(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl Reasoner for OpenAiCompatReasoner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exchange(&self, request: &RequestPayload) -> Result<String, TransportError> {
        if self.api_key.is_empty() {
            return Err(TransportError::NotConfigured(format!(
                "{}: no API key set",
                self.name
            )));
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(reasoner = %self.name, model = %self.model, bytes = request.len(), "Sending decision request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout_secs)
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!(reasoner = %self.name, status, "Reasoning service returned an error");
            return Err(classify_status(status, retry_after, body));
        }

        let reply: ChatResponse = response.json().await.map_err(|e| TransportError::Api {
            status_code: status,
            message: format!("Failed to parse response: {e}"),
        })?;

        extract_content(reply, status)
    }
}

/// Map a non-success HTTP status to a transport error.
fn classify_status(status: u16, retry_after: Option<u64>, body: String) -> TransportError {
    match status {
        401 | 403 => TransportError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        429 => TransportError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        _ => TransportError::Api {
            status_code: status,
            message: body,
        },
    }
}

fn extract_content(reply: ChatResponse, status: u16) -> Result<String, TransportError> {
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| TransportError::Api {
            status_code: status,
            message: "No content in response".into(),
        })
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: &str) -> OpenAiCompatSettings {
        OpenAiCompatSettings {
            name: "openai".into(),
            base_url: "https://api.openai.com/v1/".into(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.2,
            max_tokens: Some(1024),
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let reasoner = OpenAiCompatReasoner::new(settings("sk-test")).unwrap();
        assert_eq!(reasoner.base_url, "https://api.openai.com/v1");
        assert_eq!(reasoner.name(), "openai");
        assert_eq!(reasoner.model(), "gpt-4o-mini");
    }

    #[test]
    fn body_carries_instructions_and_payload() {
        let reasoner = OpenAiCompatReasoner::new(settings("sk-test")).unwrap();
        let payload = RequestPayload::new("<request/>");
        let body = serde_json::to_value(reasoner.body(&payload)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], RESPONSE_INSTRUCTIONS);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "<request/>");
    }

    #[test]
    fn max_tokens_omitted_when_unset() {
        let mut s = settings("sk-test");
        s.max_tokens = None;
        let reasoner = OpenAiCompatReasoner::new(s).unwrap();
        let body = serde_json::to_value(reasoner.body(&RequestPayload::new("x"))).unwrap();
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            classify_status(401, None, String::new()),
            TransportError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_status(403, None, String::new()),
            TransportError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify_status(429, Some(17), String::new()),
            TransportError::RateLimited {
                retry_after_secs: 17
            }
        ));
        assert!(matches!(
            classify_status(429, None, String::new()),
            TransportError::RateLimited {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS
            }
        ));
        match classify_status(503, None, "overloaded".into()) {
            TransportError::Api {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn content_is_taken_from_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"<decision/>"}}],"model":"m"}"#;
        let reply: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_content(reply, 200).unwrap(), "<decision/>");
    }

    #[test]
    fn empty_or_missing_content_is_an_error() {
        let reply: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_content(reply, 200).is_err());

        let reply: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(extract_content(reply, 200).is_err());

        let reply: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(extract_content(reply, 200).is_err());
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let reasoner = OpenAiCompatReasoner::new(settings("")).unwrap();
        let err = reasoner
            .exchange(&RequestPayload::new("<request/>"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotConfigured(_)));
    }

    #[test]
    fn debug_redacts_key() {
        let debug = format!("{:?}", settings("sk-secret"));
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }
}
