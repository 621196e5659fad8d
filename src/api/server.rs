use crate::api::routes;
use crate::error::{AppError, AppResult};
use crate::AppState;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// CORS: GET and POST only. An empty whitelist keeps the permissive
/// development default; production deployments set ALLOWED_ORIGINS.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST];

    if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(routes::health))
        .route("/tables", get(routes::tables))
        .route("/query", post(routes::raw_query))
        .route("/ask", post(routes::ask))
        .with_state(state)
        .layer(cors)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState) -> AppResult<()> {
    let bind_addr = state.config.bind_addr;
    let app = build_router(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::ConfigError(format!("failed to bind {}: {}", bind_addr, e)))?;

    info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::IoError(e.to_string()))?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_permissive_when_unconfigured() {
        let _layer = cors_layer(&[]);
    }

    #[test]
    fn test_cors_layer_with_origins() {
        let origins = vec![
            "https://bank.example.com".to_string(),
            "not a url".to_string(),
        ];
        let _layer = cors_layer(&origins);
    }
}
