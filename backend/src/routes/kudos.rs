//! Kudos feed routes.
//!
//! - `GET /kudos` - paged, filtered feed
//! - `POST /kudos` - send a kudos as the caller
//! - `PATCH /kudos/:id/visibility` - hide or show (admin)
//! - `DELETE /kudos/:id` - remove (admin)

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{delete, get, patch},
    Extension, Json, Router,
};
use kudos_common::{
    CreateKudosRequest, DeleteResult, Kudos, KudosPage, KudosQuery, ModerationResult,
    VisibilityRequest,
};

use crate::auth::Principal;
use crate::error::Result;
use crate::AppState;

async fn list_kudos(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
    query: std::result::Result<Query<KudosQuery>, QueryRejection>,
) -> Result<Json<KudosPage>> {
    let Query(query) = query?;
    Ok(Json(state.kudos.list(&query, &caller).await?))
}

async fn create_kudos(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
    body: std::result::Result<Json<CreateKudosRequest>, JsonRejection>,
) -> Result<Json<Kudos>> {
    let Json(request) = body?;
    Ok(Json(state.kudos.create(&request, &caller).await?))
}

async fn set_visibility(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
    id: std::result::Result<Path<String>, PathRejection>,
    body: std::result::Result<Json<VisibilityRequest>, JsonRejection>,
) -> Result<Json<ModerationResult>> {
    let Path(id) = id?;
    let Json(request) = body?;
    Ok(Json(state.kudos.set_visibility(&id, &request, &caller).await?))
}

async fn delete_kudos(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Principal>,
    id: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<DeleteResult>> {
    let Path(id) = id?;
    Ok(Json(state.kudos.delete(&id, &caller).await?))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/kudos", get(list_kudos).post(create_kudos))
        .route("/kudos/:id/visibility", patch(set_visibility))
        .route("/kudos/:id", delete(delete_kudos))
        .with_state(state)
}
