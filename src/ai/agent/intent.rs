use crate::ai::agent::Message;
use crate::ai::openrouter::LlmClient;
use crate::ai::prompts;
use crate::error::{AppError, AppResult};

/// Turn the user's question into a structured description of the data
/// request. Deterministic (temperature 0) so retries of the surrounding
/// pipeline see the same interpretation.
pub async fn interpret(llm: &dyn LlmClient, user_query: &str) -> AppResult<String> {
    let messages = vec![
        Message::system(prompts::load(prompts::INTENT)),
        Message::user(user_query),
    ];

    let content = llm.chat(&messages, 0.0).await?;
    let intent = content.trim().to_string();

    if intent.is_empty() {
        return Err(AppError::LlmInvalidResponse(
            "model returned an empty intent".into(),
        ));
    }

    Ok(intent)
}
