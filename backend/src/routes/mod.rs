pub mod health;
pub mod kudos;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};

use crate::error::ApiError;
use crate::AppState;

/// Middleware that verifies the caller's credential and stores the resulting
/// [`Principal`](crate::auth::Principal) as a request extension.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.identity_provider.authenticate(request.headers()).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(
                provider = state.identity_provider.name(),
                "Authentication failed: {}",
                e
            );
            ApiError::from(e).into_response()
        }
    }
}

/// Everything under `/api`. Every route requires an authenticated caller.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(users::router(state.clone()))
        .merge(kudos::router(state.clone()))
        .layer(middleware::from_fn_with_state(state, require_auth))
}
