//! HTTP client for the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use formpilot_page::{FieldMapping, FormField};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{json, prompts, FieldMapper, QuestionAnswerer, ResumeParser, INSUFFICIENT_DATA};
use crate::config::AiConfig;
use crate::profile::Profile;
use crate::{Error, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Answers are short; no need for the full token budget.
const ANSWER_MAX_TOKENS: u32 = 400;

/// One client per session, shared by the driver and the CLI.
pub struct AiClient {
    http: Client,
    config: AiConfig,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AiClient {
    /// Build a client. A missing credential is allowed here and reported
    /// through [`FieldMapper::is_configured`].
    pub fn new(config: &AiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.config.api_base.trim_end_matches('/'))
    }

    /// Send one system + user exchange and return the reply text. Retries
    /// on 429 only, backing off linearly.
    pub async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let api_key = self
            .config
            .api_key()
            .ok_or_else(|| Error::Configuration("no AI credential configured".into()))?;

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let response = self
                .http
                .post(self.endpoint())
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < attempts {
                let wait = self.config.retry_delay_ms * u64::from(attempt);
                warn!("Rate limited, attempt {}/{}; waiting {}ms", attempt, attempts, wait);
                tokio::time::sleep(Duration::from_millis(wait)).await;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<serde_json::Value>(&text)
                    .ok()
                    .and_then(|v| v["error"]["message"].as_str().map(String::from))
                    .unwrap_or(text);
                return Err(Error::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let response: MessagesResponse = response.json().await?;
            let text = response
                .content
                .into_iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text)
                .collect::<Vec<_>>()
                .join("\n");
            debug!("AI reply: {} chars", text.len());
            return Ok(text);
        }

        Err(Error::Api {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            message: format!("rate limited after {} attempts", attempts),
        })
    }
}

#[async_trait]
impl FieldMapper for AiClient {
    fn is_configured(&self) -> bool {
        self.config.api_key().is_some()
    }

    async fn map_fields(&self, fields: &[FormField], profile: &Profile) -> Result<Vec<FieldMapping>> {
        let user = format!(
            "Profile:\n{}\n\nForm fields:\n{}",
            serde_json::to_string_pretty(profile)?,
            serde_json::to_string_pretty(fields)?
        );
        let reply = self
            .complete(&prompts::mapping_prompt(), &user, self.config.max_tokens)
            .await
            .map_err(|e| Error::Mapping(e.to_string()))?;
        json::parse_mappings(&reply)
    }
}

#[async_trait]
impl QuestionAnswerer for AiClient {
    async fn answer(&self, question: &str, profile: &Profile) -> Result<String> {
        let user = format!(
            "Profile:\n{}\n\nQuestion: {}",
            serde_json::to_string_pretty(profile)?,
            question
        );
        let reply = self
            .complete(&prompts::answer_prompt(), &user, ANSWER_MAX_TOKENS)
            .await
            .map_err(|e| Error::Answer(e.to_string()))?;
        let answer = reply.trim();
        if answer.is_empty() {
            return Err(Error::Answer("empty answer".into()));
        }
        if answer.contains(INSUFFICIENT_DATA) {
            return Ok(INSUFFICIENT_DATA.to_string());
        }
        Ok(answer.to_string())
    }
}

#[async_trait]
impl ResumeParser for AiClient {
    async fn parse_resume(&self, text: &str) -> Result<Profile> {
        let reply = self
            .complete(prompts::RESUME_PROMPT, text, self.config.max_tokens)
            .await
            .map_err(|e| Error::ResumeParse(e.to_string()))?;
        json::parse_profile(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> AiConfig {
        AiConfig {
            api_key: Some("test-key".into()),
            api_base: base.to_string(),
            retry_delay_ms: 0,
            ..Default::default()
        }
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "msg_01",
            "model": "claude-3-5-haiku-20241022",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn"
        })
    }

    #[tokio::test]
    async fn test_complete_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/messages"))
            .and(matchers::header("x-api-key", "test-key"))
            .and(matchers::header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("hello")))
            .expect(1)
            .mount(&server)
            .await;

        let client = AiClient::new(&config(&server.uri())).unwrap();
        assert_eq!(client.complete("sys", "hi", 10).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let client = AiClient::new(&AiConfig::default()).unwrap();
        assert!(!client.is_configured());
        let err = client.complete("sys", "hi", 10).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_retries_on_rate_limit_only() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .expect(3)
            .mount(&server)
            .await;

        let client = AiClient::new(&config(&server.uri())).unwrap();
        match client.complete("sys", "hi", 10).await.unwrap_err() {
            Error::Api { status, .. } => assert_eq!(status, 429),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"error": {"type": "authentication_error", "message": "invalid x-api-key"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = AiClient::new(&config(&server.uri())).unwrap();
        match client.complete("sys", "hi", 10).await.unwrap_err() {
            Error::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_map_fields_parses_fenced_reply() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                "Sure! ```json\n[{\"id\":\"f1\",\"fieldType\":\"email\",\"confidence\":0.9}]\n```",
            )))
            .mount(&server)
            .await;

        let client = AiClient::new(&config(&server.uri())).unwrap();
        let mappings = client.map_fields(&[], &Profile::default()).await.unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].id, "f1");
    }

    #[tokio::test]
    async fn test_map_fields_failure_is_mapping_error() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = AiClient::new(&config(&server.uri())).unwrap();
        let err = client.map_fields(&[], &Profile::default()).await.unwrap_err();
        assert!(matches!(err, Error::Mapping(_)));
    }

    #[tokio::test]
    async fn test_answer_sentinel_and_trim() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("  INSUFFICIENT_DATA.\n")))
            .mount(&server)
            .await;

        let client = AiClient::new(&config(&server.uri())).unwrap();
        let answer = client.answer("Why us?", &Profile::default()).await.unwrap();
        assert_eq!(answer, INSUFFICIENT_DATA);
    }

    #[tokio::test]
    async fn test_parse_resume() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                r#"{"first_name": "Jane", "skills": ["Rust"]}"#,
            )))
            .mount(&server)
            .await;

        let client = AiClient::new(&config(&server.uri())).unwrap();
        let profile = client.parse_resume("Jane Doe\nRust").await.unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Jane"));
        assert_eq!(profile.skills, vec!["Rust".to_string()]);
    }
}
