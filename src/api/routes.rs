//! Route definitions and handlers.

use askama::Template;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use super::state::AppState;
use crate::history::HistoryEntry;
use crate::report;

/// Extra time the browser waits past the server deadline before giving up.
const CLIENT_GRACE_SECS: f64 = 5.0;

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    provider: &'a str,
    deadline_secs: f64,
    client_timeout_secs: f64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/run_test", post(run_test))
        .route("/api/speedtest", post(run_test))
        .route("/clear_history", post(clear_history))
        .route("/export/json", get(export_json))
        .route("/api/history", get(export_json))
        .route("/export/csv", get(export_csv))
        .route("/health", get(health))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let deadline_secs = state.executor.deadline().as_secs_f64();
    let page = IndexTemplate {
        provider: state.executor.provider_id(),
        deadline_secs,
        client_timeout_secs: deadline_secs + CLIENT_GRACE_SECS,
    };
    page.render()
        .map(Html)
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn run_test(State(state): State<AppState>) -> Result<Json<HistoryEntry>, ApiError> {
    state.run_test().await.map(Json)
}

async fn clear_history(State(state): State<AppState>) -> Json<Value> {
    state.history.clear();
    info!("history cleared");
    Json(json!({ "status": "cleared" }))
}

async fn export_json(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.history.all())
}

async fn export_csv(State(state): State<AppState>) -> impl IntoResponse {
    let body = report::history_csv(&state.history.all());
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"speed_history.csv\"",
            ),
        ],
        body,
    )
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.executor.provider_id(),
        "history_len": state.history.len(),
        "latest": state.history.latest(),
    }))
}
