use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use kudos_common::User;

use crate::error::Result;
use crate::AppState;

/// GET /api/users - Directory, sorted by name
async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.kudos.list_users().await?))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .with_state(state)
}
