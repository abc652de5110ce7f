//! HTTP surface for the bookkeeping service
//!
//! Thin transport only: take text in, render the typed result out. Success
//! renders as "amount currency, main → sub"; failures render their typed
//! reason.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::LedgerError;
use crate::models::StoredRecord;
use crate::service::LedgerService;

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<LedgerService>,
}

/// "amount currency, main → sub" — the success line shown to the user.
fn render_success(stored: &StoredRecord) -> String {
    format!(
        "{} {}, {} → {}",
        stored.record.amount,
        stored.record.currency,
        stored.record.main_category,
        stored.record.sub_category
    )
}

async fn health(State(state): State<ApiState>) -> Json<ApiResponse> {
    let status = state.service.health_check().await;
    Json(ApiResponse::success(status))
}

async fn record_handler(
    State(state): State<ApiState>,
    Json(req): Json<RecordRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!("received record request");

    match state.service.parse_and_store(&req.text).await {
        Ok(stored) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "record_id": stored.id,
                "summary": render_success(&stored),
                "record": stored,
            }))),
        ),
        Err(e @ LedgerError::Parse(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error(e.to_string())),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

pub fn create_router(service: Arc<LedgerService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/record", post(record_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    service: Arc<LedgerService>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
