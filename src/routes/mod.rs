use axum::{
    extract::{DefaultBodyLimit, State},
    http::Method,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{error::AppError, AppState};

pub mod campaigns;
pub mod upload;

/// Full application router with CORS, tracing and the upload size limit.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .route("/db-status", get(db_status))
        .merge(campaigns::routes())
        .merge(upload::routes())
        .layer(DefaultBodyLimit::max(state.config.max_file_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    message: &'static str,
    timestamp: String,
    port: u16,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        message: "Server running",
        timestamp: chrono::Utc::now().to_rfc3339(),
        port: state.config.port,
    })
}

#[derive(Debug, Serialize)]
struct DbStatusResponse {
    ok: bool,
    message: &'static str,
    timestamp: String,
    version: String,
}

async fn db_status(State(state): State<Arc<AppState>>) -> Result<Json<DbStatusResponse>, AppError> {
    let store = state.store.clone();
    let status = tokio::task::spawn_blocking(move || store.status()).await??;

    Ok(Json(DbStatusResponse {
        ok: true,
        message: "Database connection OK",
        timestamp: status.current_time,
        version: status.version,
    }))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let (status, body) = send(app, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["port"], 3001);
    }

    #[tokio::test]
    async fn test_db_status() {
        let (app, _) = test_app();
        let (status, body) = send(app, get("/db-status")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["version"].as_str().unwrap().starts_with('3'));
    }
}
