use crate::error::SearchError;
use crate::models::SearchSource;
use async_trait::async_trait;
use serde_json::{json, Value};

pub const MIN_ANSWER_TOKENS: u32 = 50;
pub const MAX_ANSWER_TOKENS: u32 = 3_000;
pub const DEFAULT_ANSWER_MODEL: &str = "openai/gpt-oss-20b";

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Based on the provided context from PDF \
documents, answer the user's query. Include relevant download URLs in your \
answer where appropriate. Do not pay attention to source paths that are \
local file paths. Pay attention to the page numbers and filenames. Answer \
in a short and concise way.";

/// Turns a query and its ranked source snippets into natural-language
/// text. The pipeline itself never depends on this; it sits downstream of
/// `search`.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        sources: &[SearchSource],
        max_tokens: u32,
    ) -> Result<String, SearchError>;
}

/// OpenRouter chat-completions client.
pub struct OpenRouterGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenRouterGenerator {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for OpenRouterGenerator {
    async fn generate(
        &self,
        query: &str,
        sources: &[SearchSource],
        max_tokens: u32,
    ) -> Result<String, SearchError> {
        if self.api_key.trim().is_empty() {
            return Err(SearchError::NotReady(
                "OpenRouter API key not set".to_string(),
            ));
        }

        let user_prompt = format!(
            "Context:\n{}\n\nQuery: {}\n\nAnswer:",
            build_context(sources),
            query
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": user_prompt },
                ],
                "max_tokens": clamp_max_tokens(max_tokens),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "openrouter".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: "openrouter".to_string(),
                details: "response has no message content".to_string(),
            })
    }
}

fn clamp_max_tokens(requested: u32) -> u32 {
    requested.clamp(MIN_ANSWER_TOKENS, MAX_ANSWER_TOKENS)
}

fn build_context(sources: &[SearchSource]) -> String {
    sources
        .iter()
        .map(|source| {
            format!(
                "Source: {} (Page {})\nURL: {}\nText: {}",
                source.filename, source.page_number, source.url, source.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
