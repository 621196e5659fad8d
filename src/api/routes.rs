use crate::ai::agent::ResponseEnvelope;
use crate::db::connection;
use crate::error::AppError;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

const MAX_QUESTION_CHARS: usize = 2000;
const MAX_RAW_SQL_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub tables: Vec<String>,
    pub ai_ready: bool,
}

/// GET /health: server, database, and provider readiness.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    debug!("health check requested");

    let db_healthy = connection::ping(&state.pool).await.is_ok();
    let tables = state
        .catalog
        .allowed_tables()
        .map(String::from)
        .collect();

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        database: if db_healthy { "connected" } else { "error" }.to_string(),
        tables,
        ai_ready: !state.config.llm_api_key.is_empty(),
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// GET /tables: schema metadata from the catalog.
pub async fn tables(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "tables": state.catalog.tables() }))
}

/// POST /query, the raw SQL path: validator then executor, no model involved.
/// Validator rejections are business-level refusals and stay HTTP 200.
pub async fn raw_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    if let Err(detail) = check_input(&request.sql, MAX_RAW_SQL_CHARS) {
        return malformed(detail);
    }

    let envelope = state.orchestrator.handle_raw_sql(&request.sql).await;
    (StatusCode::OK, Json(envelope))
}

/// POST /ask, the full pipeline from intent extraction.
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> impl IntoResponse {
    if let Err(detail) = check_input(&request.query, MAX_QUESTION_CHARS) {
        return malformed(detail);
    }

    let envelope = state.orchestrator.handle_question(&request.query).await;
    (StatusCode::OK, Json(envelope))
}

fn check_input(text: &str, max_chars: usize) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidRequest("query must not be blank".into()));
    }
    if text.chars().count() > max_chars {
        return Err(AppError::InvalidRequest(format!(
            "query exceeds {} characters",
            max_chars
        )));
    }
    Ok(())
}

fn malformed(error: AppError) -> (StatusCode, Json<ResponseEnvelope>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ResponseEnvelope::failure(error.to_string())),
    )
}
