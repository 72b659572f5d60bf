//! Fixtures shared by unit and integration tests.

use std::sync::Arc;

use crate::auth::{ClaimSet, HeaderIdentityProvider, Principal};
use crate::config::{
    AuthConfig, AuthProviderKind, Config, CorsConfig, DatabaseConfig, DeploymentEnvironment,
    KudosConfig, LoggingConfig, SeedConfig, ServerConfig,
};
use crate::store::InMemoryStore;
use crate::{seed, AppState};

pub fn test_config() -> Config {
    Config {
        environment: DeploymentEnvironment::Testing,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            static_dir: None,
        },
        database: DatabaseConfig {
            connection_string: "memory://".to_string(),
            name: "kudos-test".to_string(),
        },
        kudos: KudosConfig { dry_run: false },
        auth: AuthConfig {
            provider: AuthProviderKind::Header,
            authority: String::new(),
            audience: String::new(),
        },
        seed: SeedConfig { sample_kudos: false },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
    }
}

/// An in-memory store holding the directory users and no kudos.
pub async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    seed::ensure_users(store.as_ref())
        .await
        .expect("in-memory seeding cannot fail");
    store
}

/// App state over a seeded in-memory store, authenticating with test headers.
pub async fn create_test_state(dry_run: bool) -> (Arc<AppState>, Arc<InMemoryStore>) {
    let mut config = test_config();
    config.kudos.dry_run = dry_run;
    let store = seeded_store().await;
    let state = AppState::new(config, Arc::new(HeaderIdentityProvider::new()), store.clone());
    (Arc::new(state), store)
}

/// A non-admin caller.
pub fn principal(external_id: &str, name: &str) -> Principal {
    Principal::new(
        ClaimSet::new()
            .with("oid", external_id)
            .with("name", name)
            .with("preferred_username", format!("{}@contoso.com", external_id)),
    )
}

/// A caller holding the `KudosAdmin` role.
pub fn admin(external_id: &str) -> Principal {
    Principal::new(
        ClaimSet::new()
            .with("oid", external_id)
            .with("name", "Admin User")
            .with("roles", "KudosAdmin"),
    )
}

/// An admin whose credential carries no external id.
pub fn anonymous_admin() -> Principal {
    Principal::new(ClaimSet::new().with("roles", "Admin"))
}
