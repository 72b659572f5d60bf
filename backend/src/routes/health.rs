use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    dry_run: bool,
    store: &'static str,
}

/// Always 200; a failed store ping only degrades the status.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, store) = match state.kudos.store().ping().await {
        Ok(()) => ("ok", "ok"),
        Err(e) => {
            tracing::warn!("Store ping failed: {}", e);
            ("degraded", "unreachable")
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        dry_run: state.kudos.dry_run(),
        store,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}
