use crate::ai::agent::Message;
use crate::ai::openrouter::LlmClient;
use crate::ai::prompts;
use crate::ai::visualization::ChartKind;
use crate::db::query::ExecutionResult;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Rows shown to the model; enough to describe the shape without shipping
/// the whole result set back out.
const SAMPLE_ROWS: usize = 20;

#[derive(Debug)]
pub struct Insight {
    pub summary: Option<String>,
    pub chart: ChartKind,
}

static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)summary:\s*(.*?)\s*(?:\n\s*chart:|$)").unwrap());

static CHART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chart:\s*([a-z]+)").unwrap());

/// Describe an execution result and suggest a chart.
///
/// Tolerant by contract: the rows are already computed, so a provider
/// failure or malformed response degrades to no summary and a table chart
/// instead of failing the request.
pub async fn summarize(
    llm: &dyn LlmClient,
    validated_sql: &str,
    result: &ExecutionResult,
) -> Insight {
    let sample = serde_json::to_string(&result.rows[..result.rows.len().min(SAMPLE_ROWS)])
        .unwrap_or_else(|_| "[]".to_string());

    let request = format!(
        "Query: {}\nRow count: {}\nRows (sample): {}",
        validated_sql, result.row_count, sample
    );

    let messages = vec![
        Message::system(prompts::load(prompts::INSIGHT)),
        Message::user(request),
    ];

    match llm.chat(&messages, 0.0).await {
        Ok(content) => parse_insight(&content),
        Err(e) => {
            warn!(error = %e, "insight generation failed, returning rows without summary");
            Insight {
                summary: None,
                chart: ChartKind::Table,
            }
        }
    }
}

/// Extract `SUMMARY:` / `CHART:` lines. Missing SUMMARY means the whole
/// content is the summary; a missing or unknown CHART falls back to table.
fn parse_insight(content: &str) -> Insight {
    let summary = match SUMMARY_RE.captures(content) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim().to_string()),
        None => {
            let whole = content.trim();
            (!whole.is_empty()).then(|| whole.to_string())
        }
    }
    .filter(|s| !s.is_empty());

    let chart = CHART_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| ChartKind::parse(m.as_str()))
        .unwrap_or(ChartKind::Table);

    Insight { summary, chart }
}
