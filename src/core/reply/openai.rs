//! Azure OpenAI chat-completions reply provider.
//!
//! Builds HTTP POST requests against the Azure OpenAI deployments API:
//! - URL: `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={version}`
//! - Authentication: `api-key` header
//! - Body: JSON chat payload with a system prompt and the user utterance
//!
//! The reply text is extracted from `choices[0].message.content`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::base::{BaseReplyProvider, ReplyError};

/// Header carrying the Azure OpenAI API key.
const API_KEY_HEADER: &str = "api-key";

/// Configuration for the Azure OpenAI reply provider.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ReplyConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    pub endpoint: String,
    /// API key for the deployment
    pub api_key: String,
    /// Deployment name to address
    pub deployment: String,
    /// API version query parameter
    pub api_version: String,
    /// Model name sent in the request body
    pub model: String,
    /// System prompt establishing the bot persona
    pub system_prompt: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            deployment: "gpt-4o-mini".to_string(),
            api_version: "2023-03-15-preview".to_string(),
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are a helpful voice assistant".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ReplyConfig {
    /// Load endpoint and key from the environment (`AZURE_OPENAI_ENDPOINT`,
    /// `AZURE_OPENAI_KEY`), keeping defaults for the remaining fields.
    pub fn from_env() -> Result<Self, ReplyError> {
        let endpoint = std::env::var("AZURE_OPENAI_ENDPOINT").map_err(|_| {
            ReplyError::ConfigurationError("AZURE_OPENAI_ENDPOINT is not set".to_string())
        })?;
        let api_key = std::env::var("AZURE_OPENAI_KEY").map_err(|_| {
            ReplyError::ConfigurationError("AZURE_OPENAI_KEY is not set".to_string())
        })?;
        Ok(Self {
            endpoint,
            api_key,
            ..Default::default()
        })
    }

    /// Build the chat-completions URL for this deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

/// Reply provider backed by the Azure OpenAI chat-completions REST API.
pub struct OpenAiReplyProvider {
    config: ReplyConfig,
    client: reqwest::Client,
}

impl OpenAiReplyProvider {
    /// Creates a new provider with the given configuration.
    pub fn new(config: ReplyConfig) -> Result<Self, ReplyError> {
        if config.endpoint.is_empty() {
            return Err(ReplyError::ConfigurationError(
                "endpoint must not be empty".to_string(),
            ));
        }
        if config.api_key.is_empty() {
            return Err(ReplyError::ConfigurationError(
                "api_key must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ReplyError::ConfigurationError(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Build the JSON chat payload for a user utterance.
    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": self.config.system_prompt },
                { "role": "user", "content": text }
            ]
        })
    }

    /// Extract the reply text from a chat-completions response body.
    fn extract_reply(body: &serde_json::Value) -> Result<String, ReplyError> {
        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ReplyError::InvalidResponse(
                    "response missing choices[0].message.content".to_string(),
                )
            })
    }
}

#[async_trait]
impl BaseReplyProvider for OpenAiReplyProvider {
    async fn reply(&self, text: &str) -> Result<String, ReplyError> {
        let url = self.config.completions_url();
        debug!(deployment = %self.config.deployment, "requesting chat completion");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReplyError::Timeout(Duration::from_secs(self.config.request_timeout_secs))
                } else {
                    ReplyError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ReplyError::AuthenticationFailed(format!(
                "chat completion rejected with status {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "chat completion request failed");
            return Err(ReplyError::RequestFailed(format!(
                "status {status}: {body}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReplyError::InvalidResponse(e.to_string()))?;

        Self::extract_reply(&body)
    }

    fn provider_info(&self) -> &'static str {
        "Azure OpenAI chat completions"
    }
}
