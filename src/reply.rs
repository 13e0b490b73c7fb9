use crate::config::ReplyConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Returned in place of a reply whenever the generator produced nothing usable.
pub const GENERATION_FAILED: &str = "(Error generating draft)";

/// Inputs for one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyRequest {
    pub subject: String,
    pub body: String,
    pub sender_name: String,
    pub viewer_first_name: String,
}

impl ReplyRequest {
    pub fn prompt(&self) -> String {
        format!(
            "Write a professional reply to the following email.\n\n\
             Subject: {}\n\n\
             From: {}\n\n\
             {}\n\n\
             Reply should begin with: \"Hi {},\" and end with: \"Best regards, {}\"",
            self.subject, self.sender_name, self.body, self.sender_name, self.viewer_first_name
        )
    }
}

/// External text generation. Implementations never fail: anything that
/// goes wrong degrades to [`GENERATION_FAILED`].
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, request: &ReplyRequest) -> String;
}

/// Stand-in used when no generator is configured.
pub struct OfflineGenerator;

#[async_trait]
impl ReplyGenerator for OfflineGenerator {
    async fn generate(&self, _request: &ReplyRequest) -> String {
        log::warn!("No reply generator configured");
        GENERATION_FAILED.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplyConfigError {
    #[error("{0} not found in environment")]
    MissingApiKey(String),
    #[error("Invalid reply API base: {0}")]
    InvalidApiBase(String),
    #[error("HTTP client error: {0}")]
    Client(String),
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &ReplyConfig, api_key: &str) -> Result<Self, ReplyConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ReplyConfigError::Client(e.to_string()))?;

        let raw = format!(
            "{}/v1/models/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model
        );
        let endpoint =
            Url::parse(&raw).map_err(|e| ReplyConfigError::InvalidApiBase(format!("{raw}: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
        })
    }

    /// Build from the configured environment variable.
    pub fn from_env(config: &ReplyConfig) -> Result<Self, ReplyConfigError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ReplyConfigError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, &api_key)
    }

    async fn request_text(&self, prompt: String) -> Result<Option<String>, String> {
        let payload = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(prompt) }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| e.without_url().to_string())?;
        if !status.is_success() {
            return Err(format!("HTTP {status}: {body}"));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| format!("unreadable response ({e}): {body}"))?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text))
    }
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn generate(&self, request: &ReplyRequest) -> String {
        let prompt = request.prompt();
        log::debug!("Prompt being sent to reply generator:\n{}", prompt);

        match self.request_text(prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                log::error!("Reply generator returned no candidate text");
                GENERATION_FAILED.to_string()
            }
            Err(e) => {
                log::error!("Reply generation failed: {}", e);
                GENERATION_FAILED.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn request() -> ReplyRequest {
        ReplyRequest {
            subject: "Follow-up Meeting".to_string(),
            body: "Let me know what times work.\nJacob".to_string(),
            sender_name: "Jacob".to_string(),
            viewer_first_name: "Steve".to_string(),
        }
    }

    fn client(base: &str) -> GeminiClient {
        let config = ReplyConfig {
            api_base: base.to_string(),
            timeout_seconds: 5,
            ..Default::default()
        };
        GeminiClient::new(&config, "test-key").unwrap()
    }

    #[test]
    fn test_prompt_contains_greeting_and_closing() {
        let prompt = request().prompt();
        assert!(prompt.starts_with("Write a professional reply to the following email."));
        assert!(prompt.contains("Subject: Follow-up Meeting"));
        assert!(prompt.contains("From: Jacob"));
        assert!(prompt.contains("\"Hi Jacob,\""));
        assert!(prompt.ends_with("\"Best regards, Steve\""));
    }

    #[tokio::test]
    async fn test_generate_reads_first_candidate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/models/gemini-1.5-pro:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::Regex("Follow-up Meeting".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Hi Jacob, Tuesday works."}]}}]}"#)
            .create_async()
            .await;

        let text = client(&server.url()).generate(&request()).await;
        mock.assert_async().await;
        assert_eq!(text, "Hi Jacob, Tuesday works.");
    }

    #[tokio::test]
    async fn test_missing_candidates_yield_sentinel() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        assert_eq!(client(&server.url()).generate(&request()).await, GENERATION_FAILED);
    }

    #[tokio::test]
    async fn test_http_error_yields_sentinel() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        assert_eq!(client(&server.url()).generate(&request()).await, GENERATION_FAILED);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_api_key() {
        let config = ReplyConfig {
            api_base: "http://127.0.0.1:1".to_string(),
            timeout_seconds: 5,
            ..Default::default()
        };
        let client = GeminiClient::new(&config, "SECRET-KEY-123").unwrap();
        assert!(!client.endpoint.as_str().contains("SECRET-KEY-123"));

        let error = client.request_text("hello".to_string()).await.unwrap_err();
        assert!(!error.contains("SECRET-KEY-123"), "{error}");
    }

    #[tokio::test]
    async fn test_offline_generator_yields_sentinel() {
        assert_eq!(OfflineGenerator.generate(&request()).await, GENERATION_FAILED);
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let config = ReplyConfig {
            api_key_env: "CLIENT_MAIL_ROUTER_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            GeminiClient::from_env(&config),
            Err(ReplyConfigError::MissingApiKey(_))
        ));
    }
}
