// src/services/generation/llm.rs

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::GenerationError;
use crate::config::GenerationConfig;

/// Client for an OpenAI-compatible chat-completions gateway.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

impl LlmClient {
    pub fn new(http: Client, config: &GenerationConfig) -> Self {
        Self {
            http,
            base_url: config.llm_api_base_url.trim_end_matches('/').to_string(),
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
        }
    }

    /// Sends one system + user exchange and returns the text of the first choice.
    /// Single attempt; retries are left to the caller.
    pub async fn complete(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
    ) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, "Sending chat completion request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(GenerationError::RateLimited),
            StatusCode::PAYMENT_REQUIRED => return Err(GenerationError::PaymentRequired),
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = %s, body = %body, "Language model gateway error");
                return Err(GenerationError::Upstream {
                    service: "language model",
                    status: s.as_u16(),
                });
            }
            _ => {}
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}
