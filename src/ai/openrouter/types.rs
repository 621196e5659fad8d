use serde::{Deserialize, Serialize};

/// Request to OpenRouter API
#[derive(Debug, Serialize)]
pub struct OpenRouterRequest {
    pub model: String,
    pub messages: Vec<OpenRouterMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Message in OpenRouter format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenRouterMessage {
    pub role: String,
    pub content: String,
}

impl From<&crate::ai::agent::Message> for OpenRouterMessage {
    fn from(msg: &crate::ai::agent::Message) -> Self {
        let role = match msg.role {
            crate::ai::agent::MessageRole::System => "system",
            crate::ai::agent::MessageRole::User => "user",
            crate::ai::agent::MessageRole::Assistant => "assistant",
        };

        Self {
            role: role.to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Response from OpenRouter API (non-streaming)
#[derive(Debug, Deserialize)]
pub struct OpenRouterResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}
