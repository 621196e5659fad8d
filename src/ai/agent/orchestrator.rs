use crate::ai::agent::state::{RequestState, ResponseEnvelope};
use crate::ai::agent::{insight, intent, sql};
use crate::ai::openrouter::LlmClient;
use crate::ai::sanitizer;
use crate::config::Config;
use crate::db::query::{ExecError, QueryExecutor};
use crate::db::schema::SchemaCatalog;
use crate::error::AppError;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one synthesize→validate→execute round.
enum RoundOutcome {
    Done,
    Retry,
    Fail(String),
}

/// Drives a request through intent extraction, SQL synthesis, validation,
/// execution, and insight generation, feeding validator and executor
/// failures back into regeneration until the retry budget runs out.
///
/// Shared across requests; all per-request state lives in `RequestState`.
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn QueryExecutor>,
    catalog: Arc<SchemaCatalog>,
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn QueryExecutor>,
        catalog: Arc<SchemaCatalog>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            llm,
            executor,
            catalog,
            config,
        }
    }

    /// Full pipeline: natural-language question in, envelope out.
    pub async fn handle_question(&self, user_query: &str) -> ResponseEnvelope {
        let request_id = Uuid::new_v4();
        let mut state = RequestState::new(user_query);

        // Intent runs once; the same provider call with the same input has
        // no reason to be retried.
        match intent::interpret(self.llm.as_ref(), user_query).await {
            Ok(interpreted) => {
                info!(%request_id, intent = %interpreted, "intent extracted");
                state.interpreted_intent = Some(interpreted);
            }
            Err(e) => {
                warn!(%request_id, error = %e, "intent extraction failed");
                return ResponseEnvelope::failure(user_facing(&e));
            }
        }

        loop {
            match self.run_round(&request_id, &mut state).await {
                RoundOutcome::Done => break,
                RoundOutcome::Retry => continue,
                RoundOutcome::Fail(error) => return ResponseEnvelope::failure(error),
            }
        }

        // Insight failures never fail the request; the rows are already
        // computed.
        let (validated_sql, row_count, insight) =
            match (&state.validated_sql, &state.execution_result) {
                (Some(sql), Some(result)) => (
                    sql.clone(),
                    result.row_count,
                    insight::summarize(self.llm.as_ref(), sql, result).await,
                ),
                _ => return ResponseEnvelope::failure("internal error"),
            };
        state.summary = insight.summary;
        state.chart_suggestion = Some(insight.chart);

        info!(%request_id, sql = %validated_sql, rows = row_count, "request completed");
        self.success_envelope(state)
    }

    /// Bypass path: the client supplied the SQL, so there is no
    /// regeneration source and no model in the loop at all.
    pub async fn handle_raw_sql(&self, raw_sql: &str) -> ResponseEnvelope {
        let request_id = Uuid::new_v4();
        let mut state = RequestState::new(raw_sql);
        state.generated_sql = Some(raw_sql.to_string());

        let accepted = match sanitizer::validate_sql(raw_sql, &self.catalog, &self.config) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                info!(%request_id, kind = ?rejection.kind, "raw statement rejected");
                return ResponseEnvelope::failure(rejection.detail);
            }
        };
        state.accept_sql(accepted.clone());

        match self.executor.run(&accepted).await {
            Ok(result) => {
                info!(%request_id, rows = result.row_count, "raw statement executed");
                state.execution_result = Some(result);
                self.success_envelope(state)
            }
            Err(e) => {
                warn!(%request_id, "raw statement execution failed");
                ResponseEnvelope::failure(exec_error_detail(&e, &self.config))
            }
        }
    }

    /// One synthesize, validate, execute round of the retry loop.
    async fn run_round(&self, request_id: &Uuid, state: &mut RequestState) -> RoundOutcome {
        let interpreted = state.interpreted_intent.clone().unwrap_or_default();

        // Synthesize, feeding the previous failure back in.
        let generated = match sql::generate(
            self.llm.as_ref(),
            &self.catalog,
            &interpreted,
            state.error_message.as_deref(),
        )
        .await
        {
            Ok(generated) => generated,
            Err(e) => return RoundOutcome::Fail(user_facing(&e)),
        };
        state.generated_sql = Some(generated.clone());

        // Validate.
        match sanitizer::validate_sql(&generated, &self.catalog, &self.config) {
            Ok(accepted) => state.accept_sql(accepted),
            Err(rejection) => {
                info!(%request_id, kind = ?rejection.kind, retry = state.retry_count,
                    "generated statement rejected");
                return self.spend_retry(state, rejection.detail);
            }
        }

        // Execute. `validated_sql` was just set by the accept arm above.
        let accepted = state.validated_sql.clone().unwrap_or_default();
        match self.executor.run(&accepted).await {
            Ok(result) => {
                state.execution_result = Some(result);
                RoundOutcome::Done
            }
            Err(e) => {
                warn!(%request_id, retry = state.retry_count, "execution failed");
                self.spend_retry(state, exec_error_detail(&e, &self.config))
            }
        }
    }

    fn spend_retry(&self, state: &mut RequestState, detail: String) -> RoundOutcome {
        if state.fail_attempt(detail.clone(), self.config.max_retries) {
            RoundOutcome::Retry
        } else {
            RoundOutcome::Fail(detail)
        }
    }

    fn success_envelope(&self, state: RequestState) -> ResponseEnvelope {
        ResponseEnvelope {
            validated_sql: state.validated_sql,
            execution_result: state.execution_result.map(Into::into),
            summary: state.summary,
            chart_suggestion: state.chart_suggestion,
            error: None,
        }
    }
}

fn exec_error_detail(error: &ExecError, config: &Config) -> String {
    match error {
        ExecError::Timeout => format!(
            "query timed out after {} seconds",
            config.query_timeout_seconds
        ),
        ExecError::Database(message) => format!("database error: {}", message),
    }
}

/// The single conversion point from internal error kinds to the envelope's
/// `error` string. Nothing sensitive passes through here.
fn user_facing(error: &AppError) -> String {
    match error {
        AppError::LlmUnavailable(_) => "AI provider is unavailable".to_string(),
        AppError::LlmInvalidResponse(_) => {
            "AI provider returned an unusable response".to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::agent::Message;
    use crate::ai::visualization::ChartKind;
    use crate::db::query::ExecutionResult;
    use crate::error::AppResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted model: pops one canned reply per chat call.
    struct MockLlm {
        replies: Mutex<VecDeque<AppResult<String>>>,
        calls: AtomicUsize,
    }

    impl MockLlm {
        fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn chat(&self, _messages: &[Message], _temperature: f32) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .expect("mock lock")
                .pop_front()
                .unwrap_or_else(|| Err(AppError::LlmUnavailable("script exhausted".into())))
        }
    }

    /// Scripted executor: pops one canned outcome per run call.
    struct MockExecutor {
        outcomes: Mutex<VecDeque<Result<ExecutionResult, ExecError>>>,
        calls: AtomicUsize,
        seen_sql: Mutex<Vec<String>>,
    }

    impl MockExecutor {
        fn new(outcomes: Vec<Result<ExecutionResult, ExecError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: AtomicUsize::new(0),
                seen_sql: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryExecutor for MockExecutor {
        async fn run(&self, sql: &str) -> Result<ExecutionResult, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_sql.lock().expect("mock lock").push(sql.to_string());
            self.outcomes
                .lock()
                .expect("mock lock")
                .pop_front()
                .unwrap_or_else(|| Err(ExecError::Database("script exhausted".into())))
        }
    }

    fn single_row(key: &str, value: i64) -> ExecutionResult {
        let mut row = serde_json::Map::new();
        row.insert(key.to_string(), serde_json::json!(value));
        ExecutionResult {
            rows: vec![row],
            row_count: 1,
            elapsed_ms: 1.0,
        }
    }

    fn orchestrator(llm: Arc<MockLlm>, executor: Arc<MockExecutor>) -> Orchestrator {
        Orchestrator::new(
            llm,
            executor,
            Arc::new(SchemaCatalog::banking()),
            Arc::new(Config::default()),
        )
    }

    #[tokio::test]
    async fn test_happy_path_count_question() {
        let llm = MockLlm::new(vec![
            Ok("Count all rows in customers.".into()),
            Ok("SELECT COUNT(*) AS count FROM customers".into()),
            Ok("SUMMARY: There are 5 customers.\nCHART: metric".into()),
        ]);
        let executor = MockExecutor::new(vec![Ok(single_row("count", 5))]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("How many customers are there?").await;

        assert!(envelope.error.is_none());
        let result = envelope.execution_result.expect("rows");
        assert_eq!(result.data[0]["count"], serde_json::json!(5));
        assert_eq!(envelope.summary.as_deref(), Some("There are 5 customers."));
        assert_eq!(envelope.chart_suggestion, Some(ChartKind::Metric));
        assert!(envelope.validated_sql.unwrap().ends_with("limit 100"));
        assert_eq!(llm.calls(), 3);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn test_validation_rejection_feeds_retry() {
        // First synthesis names an unauthorized table; the retry corrects it.
        let llm = MockLlm::new(vec![
            Ok("List everything about customers.".into()),
            Ok("SELECT * FROM users".into()),
            Ok("SELECT * FROM customers".into()),
            Ok("SUMMARY: Listing customers.\nCHART: table".into()),
        ]);
        let executor = MockExecutor::new(vec![Ok(single_row("id", 1))]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("show me the users").await;

        assert!(envelope.error.is_none());
        assert!(envelope.validated_sql.unwrap().contains("from customers"));
        // Intent + two SQL syntheses + insight.
        assert_eq!(llm.calls(), 4);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_allows_three_syntheses_then_fails() {
        let llm = MockLlm::new(vec![
            Ok("intent".into()),
            Ok("SELECT * FROM users".into()),
            Ok("SELECT * FROM users".into()),
            Ok("SELECT * FROM users".into()),
        ]);
        let executor = MockExecutor::new(vec![]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("anything").await;

        assert!(envelope.error.is_some());
        assert!(envelope.validated_sql.is_none());
        assert!(envelope.execution_result.is_none());
        assert!(envelope.summary.is_none());
        // Intent + exactly three SQL syntheses, never a fourth.
        assert_eq!(llm.calls(), 4);
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_execution_failure_feeds_retry() {
        let llm = MockLlm::new(vec![
            Ok("intent".into()),
            Ok("SELECT * FROM accounts".into()),
            Ok("SELECT id FROM accounts".into()),
            Ok("SUMMARY: ok\nCHART: table".into()),
        ]);
        let executor = MockExecutor::new(vec![
            Err(ExecError::Database("column does not exist".into())),
            Ok(single_row("id", 7)),
        ]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("account ids").await;

        assert!(envelope.error.is_none());
        assert_eq!(executor.calls(), 2);
        assert_eq!(llm.calls(), 4);
    }

    #[tokio::test]
    async fn test_timeout_exhausts_budget() {
        let llm = MockLlm::new(vec![
            Ok("intent".into()),
            Ok("SELECT * FROM transactions".into()),
            Ok("SELECT * FROM transactions".into()),
            Ok("SELECT * FROM transactions".into()),
        ]);
        let executor = MockExecutor::new(vec![
            Err(ExecError::Timeout),
            Err(ExecError::Timeout),
            Err(ExecError::Timeout),
        ]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("everything").await;

        assert!(envelope.error.as_deref().unwrap().contains("timed out"));
        assert!(envelope.execution_result.is_none());
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test]
    async fn test_intent_failure_is_not_retried() {
        let llm = MockLlm::new(vec![Err(AppError::LlmUnavailable("down".into()))]);
        let executor = MockExecutor::new(vec![]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("hello").await;

        assert_eq!(envelope.error.as_deref(), Some("AI provider is unavailable"));
        assert_eq!(llm.calls(), 1);
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_insight_failure_is_tolerated() {
        let llm = MockLlm::new(vec![
            Ok("intent".into()),
            Ok("SELECT COUNT(*) AS n FROM customers".into()),
            Err(AppError::LlmUnavailable("down".into())),
        ]);
        let executor = MockExecutor::new(vec![Ok(single_row("n", 5))]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("how many?").await;

        assert!(envelope.error.is_none());
        assert!(envelope.summary.is_none());
        assert_eq!(envelope.chart_suggestion, Some(ChartKind::Table));
        assert!(envelope.execution_result.is_some());
    }

    #[tokio::test]
    async fn test_raw_sql_never_calls_the_model() {
        let llm = MockLlm::new(vec![]);
        let executor = MockExecutor::new(vec![Ok(single_row("n", 5))]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch
            .handle_raw_sql("SELECT COUNT(*) AS n FROM customers")
            .await;

        assert!(envelope.error.is_none());
        assert!(envelope.validated_sql.unwrap().ends_with("limit 100"));
        assert!(envelope.summary.is_none());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_raw_sql_rejection_is_not_retried() {
        let llm = MockLlm::new(vec![]);
        let executor = MockExecutor::new(vec![]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch
            .handle_raw_sql("SELECT * FROM customers; DROP TABLE accounts")
            .await;

        assert!(envelope
            .error
            .as_deref()
            .unwrap()
            .contains("multiple statements"));
        assert!(envelope.validated_sql.is_none());
        assert!(envelope.execution_result.is_none());
        assert_eq!(llm.calls(), 0);
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_raw_sql_execution_failure_surfaces() {
        let llm = MockLlm::new(vec![]);
        let executor = MockExecutor::new(vec![Err(ExecError::Database("boom".into()))]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_raw_sql("SELECT * FROM accounts").await;

        assert!(envelope.error.as_deref().unwrap().contains("boom"));
        assert!(envelope.execution_result.is_none());
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn test_executor_only_sees_validated_sql() {
        let llm = MockLlm::new(vec![
            Ok("intent".into()),
            Ok("```sql\nSELECT * FROM accounts LIMIT 5000;\n```".into()),
            Ok("SUMMARY: ok\nCHART: table".into()),
        ]);
        let executor = MockExecutor::new(vec![Ok(single_row("id", 1))]);
        let orch = orchestrator(llm.clone(), executor.clone());

        let envelope = orch.handle_question("all accounts").await;

        assert!(envelope.error.is_none());
        let seen = executor.seen_sql.lock().expect("mock lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], "select * from accounts limit 1000");
    }
}
