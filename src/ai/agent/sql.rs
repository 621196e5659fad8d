use crate::ai::agent::Message;
use crate::ai::openrouter::LlmClient;
use crate::ai::prompts;
use crate::db::schema::SchemaCatalog;
use crate::error::{AppError, AppResult};

/// Synthesize a candidate SELECT from the interpreted intent. On retries the
/// previous rejection is injected verbatim so the model can self-correct.
pub async fn generate(
    llm: &dyn LlmClient,
    catalog: &SchemaCatalog,
    intent: &str,
    previous_error: Option<&str>,
) -> AppResult<String> {
    let system = prompts::load(prompts::SQL_GENERATION).replace("{schema}", &catalog.as_prompt_text());

    let mut request = format!("Data request: {}", intent);
    if let Some(error) = previous_error {
        request.push_str(&format!(
            "\n\nThe previous statement was rejected: {}\nProduce a corrected statement.",
            error
        ));
    }

    let messages = vec![Message::system(system), Message::user(request)];
    let content = llm.chat(&messages, 0.0).await?;
    let sql = clean_model_sql(&content);

    if sql.is_empty() {
        return Err(AppError::LlmInvalidResponse(
            "model returned no SQL".into(),
        ));
    }

    Ok(sql)
}

/// Strip markdown code fences and trailing semicolons, and collapse
/// whitespace. Models wrap SQL in fences no matter how firmly the prompt
/// forbids it.
fn clean_model_sql(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(inner) = text.strip_prefix("```") {
        let inner = inner.strip_suffix("```").unwrap_or(inner);
        // Drop an optional language tag on the opening fence line.
        text = match inner.split_once('\n') {
            Some((first_line, rest)) if first_line.trim().chars().all(|c| c.is_ascii_alphabetic()) => {
                rest
            }
            _ => inner,
        };
        text = text.trim();
    }

    let mut sql = text.split_whitespace().collect::<Vec<_>>().join(" ");
    while sql.ends_with(';') {
        sql.pop();
        sql.truncate(sql.trim_end().len());
    }

    sql
}
