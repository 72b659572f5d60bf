pub mod auth;
pub mod config;
pub mod error;
pub mod kudos;
pub mod logging;
pub mod routes;
pub mod seed;
pub mod store;
pub mod test_util;

pub use auth::{IdentityProvider, JwksClient, Principal};
pub use config::Config;
pub use error::ApiError;
pub use kudos::KudosService;
pub use store::{InMemoryStore, KudosStore, MongoStore};

use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Verifies credentials on every `/api` request.
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub kudos: KudosService,
}

impl AppState {
    pub fn new(
        config: Config,
        identity_provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn KudosStore>,
    ) -> Self {
        let kudos = KudosService::new(store, config.kudos.dry_run);
        Self {
            config,
            identity_provider,
            kudos,
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any);

    match config.cors.origin_list() {
        None => layer.allow_origin(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                        None
                    }
                })
                .collect();
            layer.allow_origin(origins)
        }
    }
}

/// Build the full HTTP application.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .merge(routes::health::router(state.clone()))
        .nest("/api", routes::api_router(state.clone()));

    if let Some(dir) = &state.config.server.static_dir {
        let index = Path::new(dir).join("index.html");
        tracing::info!("Serving frontend from {}", dir);
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(cors_layer(&state.config))
        .layer(middleware::from_fn(logging::request_logger))
        .layer(TraceLayer::new_for_http())
}
