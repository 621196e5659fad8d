use super::types::{OpenRouterMessage, OpenRouterRequest, OpenRouterResponse};
use crate::ai::agent::Message;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Seam between the agents and the model provider. The production
/// implementation talks to OpenRouter; tests substitute a scripted mock.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single chat-completion round trip; returns the assistant content.
    async fn chat(&self, messages: &[Message], temperature: f32) -> AppResult<String>;
}

/// OpenRouter API client
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat(&self, messages: &[Message], temperature: f32) -> AppResult<String> {
        let openrouter_messages: Vec<OpenRouterMessage> =
            messages.iter().map(|m| m.into()).collect();

        let request = OpenRouterRequest {
            model: self.model.clone(),
            messages: openrouter_messages,
            temperature: Some(temperature),
            max_tokens: Some(2000),
            stream: Some(false),
        };

        let response = self
            .client
            .post(OPENROUTER_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LlmUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::LlmUnavailable(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let api_response: OpenRouterResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmInvalidResponse(format!("Parse error: {}", e)))?;

        api_response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::LlmInvalidResponse("No response from API".into()))
    }
}
