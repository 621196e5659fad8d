use crate::ai::visualization::ChartKind;
use crate::db::query::ExecutionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message in a model conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Per-request record owned by the orchestrator, created on accept and
/// discarded after the envelope is emitted.
#[derive(Debug)]
pub struct RequestState {
    pub user_query: String,
    pub interpreted_intent: Option<String>,
    pub generated_sql: Option<String>,
    pub validated_sql: Option<String>,
    pub execution_result: Option<ExecutionResult>,
    pub retry_count: u8,
    pub error_message: Option<String>,
    pub summary: Option<String>,
    pub chart_suggestion: Option<ChartKind>,
}

impl RequestState {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            interpreted_intent: None,
            generated_sql: None,
            validated_sql: None,
            execution_result: None,
            retry_count: 0,
            error_message: None,
            summary: None,
            chart_suggestion: None,
        }
    }

    /// Record an accepted statement. Acceptance clears any earlier failure,
    /// keeping `validated_sql` and `error_message` mutually exclusive.
    pub fn accept_sql(&mut self, normalized_sql: String) {
        self.validated_sql = Some(normalized_sql);
        self.error_message = None;
    }

    /// Record a validation or execution failure and spend one retry.
    ///
    /// The only place `retry_count` moves. Returns whether budget remains
    /// for another synthesis round.
    pub fn fail_attempt(&mut self, detail: String, max_retries: u8) -> bool {
        self.error_message = Some(detail);
        self.validated_sql = None;
        self.execution_result = None;
        self.retry_count += 1;
        self.retry_count <= max_retries
    }
}

/// The one response shape every request produces, success or failure.
#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    pub validated_sql: Option<String>,
    pub execution_result: Option<ResultPayload>,
    pub summary: Option<String>,
    pub chart_suggestion: Option<ChartKind>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResultPayload {
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub row_count: usize,
    pub elapsed_ms: f64,
}

impl From<ExecutionResult> for ResultPayload {
    fn from(result: ExecutionResult) -> Self {
        Self {
            data: result.rows,
            row_count: result.row_count,
            elapsed_ms: result.elapsed_ms,
        }
    }
}

impl ResponseEnvelope {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            validated_sql: None,
            execution_result: None,
            summary: None,
            chart_suggestion: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_clears_previous_error() {
        let mut state = RequestState::new("how many customers");
        state.fail_attempt("bad table".into(), 2);
        assert!(state.error_message.is_some());

        state.accept_sql("select count(*) from customers limit 100".into());
        assert!(state.error_message.is_none());
        assert!(state.validated_sql.is_some());
    }

    #[test]
    fn test_fail_attempt_budget() {
        let mut state = RequestState::new("q");
        assert!(state.fail_attempt("e1".into(), 2));
        assert!(state.fail_attempt("e2".into(), 2));
        assert!(!state.fail_attempt("e3".into(), 2));
        assert_eq!(state.retry_count, 3);
        assert!(state.validated_sql.is_none());
        assert!(state.execution_result.is_none());
    }

    #[test]
    fn test_failure_envelope_populates_only_error() {
        let envelope = ResponseEnvelope::failure("nope");
        assert!(envelope.validated_sql.is_none());
        assert!(envelope.execution_result.is_none());
        assert!(envelope.summary.is_none());
        assert!(envelope.chart_suggestion.is_none());
        assert_eq!(envelope.error.as_deref(), Some("nope"));
    }
}
