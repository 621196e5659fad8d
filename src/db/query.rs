use crate::config::Config;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Column, PgPool, Row, TypeInfo, ValueRef};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// Result of executing an accepted statement. Row values are JSON-safe
/// scalars only.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub row_count: usize,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    Timeout,
    Database(String),
}

/// Execution seam: the orchestrator only sees this trait, so its state
/// machine is testable without a live database.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a validator-accepted statement. Callers must not pass anything
    /// that has not been through the sanitizer.
    async fn run(&self, sql: &str) -> Result<ExecutionResult, ExecError>;
}

pub struct PgQueryExecutor {
    pool: PgPool,
    timeout: Duration,
    max_rows: usize,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(config.query_timeout_seconds),
            max_rows: config.max_result_rows,
        }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn run(&self, sql: &str) -> Result<ExecutionResult, ExecError> {
        let mut tx = self.pool.begin().await.map_err(sanitize_error)?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(sanitize_error)?;

        // Wall-clock bound around the fetch only, not connection acquisition.
        let start = Instant::now();
        let max_rows = self.max_rows;
        let fetch = async {
            let mut stream = sqlx::query(sql).fetch(&mut *tx);
            let mut rows = Vec::new();

            while let Some(row) = stream.try_next().await? {
                rows.push(row_to_json(&row)?);
                // Hard cap on result size, independent of the statement's
                // LIMIT clause.
                if rows.len() >= max_rows {
                    break;
                }
            }

            Ok::<_, sqlx::Error>(rows)
        };

        let rows = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return Err(sanitize_error(e)),
            // Dropping the transaction rolls back and returns the connection.
            Err(_) => return Err(ExecError::Timeout),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        tx.rollback().await.map_err(sanitize_error)?;

        Ok(ExecutionResult {
            row_count: rows.len(),
            rows,
            elapsed_ms,
        })
    }
}

static CREDENTIAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)[a-z+]+://\S+").unwrap(),
        Regex::new(r"(?i)password\s*=\s*\S+").unwrap(),
    ]
});

/// Map a driver error to `ExecError::Database` with anything
/// credential-looking removed. No stack traces cross this boundary.
fn sanitize_error(err: sqlx::Error) -> ExecError {
    let mut message = err.to_string();
    for pattern in CREDENTIAL_PATTERNS.iter() {
        message = pattern.replace_all(&message, "[redacted]").into_owned();
    }
    ExecError::Database(message)
}

fn row_to_json(
    row: &sqlx::postgres::PgRow,
) -> Result<serde_json::Map<String, serde_json::Value>, sqlx::Error> {
    let mut row_map = serde_json::Map::with_capacity(row.columns().len());

    for (idx, column) in row.columns().iter().enumerate() {
        let col_name = column.name().to_string();
        let raw_value = row.try_get_raw(idx)?;
        let value = if raw_value.is_null() {
            serde_json::Value::Null
        } else {
            convert_pg_value(row, idx, column.type_info().name())
        };
        row_map.insert(col_name, value);
    }

    Ok(row_map)
}

/// JSON has no number form for NaN or the infinities; encode them as
/// strings rather than dropping the value from the row.
fn json_number(val: f64) -> serde_json::Value {
    match serde_json::Number::from_f64(val) {
        Some(n) => serde_json::Value::Number(n),
        None if val.is_nan() => serde_json::Value::String("NaN".into()),
        None if val.is_sign_positive() => serde_json::Value::String("Infinity".into()),
        None => serde_json::Value::String("-Infinity".into()),
    }
}

/// Convert a PostgreSQL value to JSON based on column type.
///
/// Serialization policy: timestamps and dates become ISO-8601 strings,
/// NUMERIC becomes f64 (lossy, acceptable for this reporting domain), BYTEA
/// becomes UTF-8 with replacement, integers/floats/booleans/strings pass
/// through.
fn convert_pg_value(row: &sqlx::postgres::PgRow, idx: usize, col_type: &str) -> serde_json::Value {
    match col_type {
        "BOOL" => row
            .try_get::<bool, _>(idx)
            .map(serde_json::Value::Bool)
            .unwrap_or(serde_json::Value::Null),
        "INT2" | "SMALLINT" | "SMALLSERIAL" => row
            .try_get::<i16, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "INT4" | "INT" | "SERIAL" => row
            .try_get::<i32, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "INT8" | "BIGINT" | "BIGSERIAL" => row
            .try_get::<i64, _>(idx)
            .map(|v| serde_json::Value::Number(v.into()))
            .unwrap_or(serde_json::Value::Null),
        "FLOAT4" | "REAL" => row
            .try_get::<f32, _>(idx)
            .map(|v| json_number(v as f64))
            .unwrap_or(serde_json::Value::Null),
        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<f64, _>(idx)
            .map(json_number)
            .unwrap_or(serde_json::Value::Null),
        "NUMERIC" | "DECIMAL" => row
            .try_get::<Decimal, _>(idx)
            .ok()
            .and_then(|v| v.to_f64())
            .map(json_number)
            .unwrap_or(serde_json::Value::Null),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|v| serde_json::Value::String(v.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|v| serde_json::Value::String(v.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|v| {
                serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            })
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|v| serde_json::Value::String(v.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(idx)
            .map(|v| serde_json::Value::String(v.to_string()))
            .unwrap_or(serde_json::Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(idx)
            .unwrap_or(serde_json::Value::Null),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(serde_json::Value::Null),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
            .try_get::<String, _>(idx)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
        _ => {
            if let Ok(val) = row.try_get::<String, _>(idx) {
                serde_json::Value::String(val)
            } else if let Ok(val) = row.try_get::<i64, _>(idx) {
                serde_json::Value::Number(val.into())
            } else if let Ok(val) = row.try_get::<f64, _>(idx) {
                json_number(val)
            } else if let Ok(val) = row.try_get::<bool, _>(idx) {
                serde_json::Value::Bool(val)
            } else {
                serde_json::Value::String(format!("<unsupported: {}>", col_type))
            }
        }
    }
}
