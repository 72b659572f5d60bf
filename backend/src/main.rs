use std::sync::Arc;

use tokio::net::TcpListener;

use kudos_backend::{app, auth, logging, seed, store, AppState, Config};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    logging::init(&config.logging.level);

    tracing::info!(
        environment = ?config.environment,
        dry_run = config.kudos.dry_run,
        "Starting Kudos API"
    );

    // Initialize components
    let store = store::connect(&config.database).await?;
    seed::run(store.as_ref(), &config).await?;

    let identity_provider = auth::provider_from_config(&config.auth).await?;
    tracing::info!("Authenticating with the {} provider", identity_provider.name());

    let state = Arc::new(AppState::new(config.clone(), identity_provider, store));
    let app = app(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
