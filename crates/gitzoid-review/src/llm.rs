use std::time::Duration;

use async_trait::async_trait;
use gitzoid_core::{GitzoidError, LlmConfig, ReviewType};
use gitzoid_tracker::ReviewPayload;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::prompt;
use crate::render::{
    generate_full_comment, generate_incremental_comment, FullReview, IncrementalReview,
};

/// A message in a chat conversation with the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use gitzoid_review::llm::Role;
///
/// assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes `/v1/chat/completions`: OpenAI,
/// Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use gitzoid_core::LlmConfig;
/// use gitzoid_review::llm::LlmClient;
///
/// let client = LlmClient::new(&LlmConfig::default()).unwrap();
/// assert_eq!(client.model(), "gpt-4o-mini");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GitzoidError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, GitzoidError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GitzoidError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.api_root())
    }

    /// Send a chat completion request and return the text response.
    ///
    /// The request asks for a JSON object response at temperature 0.2.
    ///
    /// # Errors
    ///
    /// Returns [`GitzoidError::Llm`] on HTTP errors or response parsing failures.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, GitzoidError> {
        let url = self.completions_url();
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.2,
            "max_tokens": self.config.max_output_tokens,
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        debug!(model = %self.config.model, %url, "sending chat completion");
        let response = request
            .send()
            .await
            .map_err(|e| GitzoidError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GitzoidError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GitzoidError::Llm(format!("failed to parse response: {e}")))?;

        extract_content(&response_body)
    }
}

fn extract_content(response_body: &serde_json::Value) -> Result<String, GitzoidError> {
    response_body
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GitzoidError::Llm(format!("unexpected response structure: {response_body}")))
}

/// Structured review produced for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewResult {
    Full(FullReview),
    Incremental(IncrementalReview),
}

impl ReviewResult {
    /// Render the review as the markdown comment posted on the PR.
    pub fn render(&self, payload: &ReviewPayload) -> String {
        match self {
            ReviewResult::Full(review) => generate_full_comment(review),
            ReviewResult::Incremental(review) => generate_incremental_comment(
                review,
                payload.previous.as_ref().map(|p| p.sha.as_str()),
                Some(payload.current_sha.as_str()),
            ),
        }
    }
}

/// Turns a review payload into a structured review.
#[async_trait]
pub trait ReviewGenerator: Send + Sync {
    /// Generate a review for `payload`, with optional maintainer guidance.
    async fn generate(
        &self,
        payload: &ReviewPayload,
        additional_context: Option<&str>,
    ) -> Result<ReviewResult, GitzoidError>;
}

/// [`ReviewGenerator`] backed by an OpenAI-compatible chat model.
pub struct LlmReviewer {
    client: LlmClient,
    max_diff_chars: usize,
}

impl LlmReviewer {
    pub fn new(client: LlmClient, max_diff_chars: usize) -> Self {
        Self {
            client,
            max_diff_chars,
        }
    }
}

#[async_trait]
impl ReviewGenerator for LlmReviewer {
    async fn generate(
        &self,
        payload: &ReviewPayload,
        additional_context: Option<&str>,
    ) -> Result<ReviewResult, GitzoidError> {
        match payload.review_type {
            ReviewType::Full => {
                let user = prompt::build_full_review_prompt(
                    payload,
                    self.max_diff_chars,
                    additional_context,
                );
                let messages = vec![
                    ChatMessage::system(prompt::full_system_prompt()),
                    ChatMessage::user(user),
                ];
                let response = self.client.chat(messages).await?;
                prompt::parse_full_review(&response).map(ReviewResult::Full)
            }
            ReviewType::Incremental => {
                let user = prompt::build_incremental_review_prompt(
                    payload,
                    self.max_diff_chars,
                    additional_context,
                );
                let messages = vec![
                    ChatMessage::system(prompt::incremental_system_prompt()),
                    ChatMessage::user(user),
                ];
                let response = self.client.chat(messages).await?;
                prompt::parse_incremental_review(&response).map(ReviewResult::Incremental)
            }
        }
    }
}
