//! Configuration for the kudos backend.

use std::path::Path;

use config::{Config as ConfigLoader, ConfigBuilder, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;

pub use config::ConfigError;

/// Deployment environment. Anything but `Production` gets sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentEnvironment {
    #[default]
    Development,
    Testing,
    Production,
}

impl DeploymentEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, DeploymentEnvironment::Production)
    }
}

/// Application configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: DeploymentEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub kudos: KudosConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding a built frontend, served for unmatched paths.
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `mongodb://...` for the document store, `memory://` for an in-process store.
    #[serde(default = "default_connection_string")]
    pub connection_string: String,
    #[serde(default = "default_database_name")]
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            name: default_database_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KudosConfig {
    /// Run every write path without persisting anything.
    #[serde(default)]
    pub dry_run: bool,
}

/// Which identity provider verifies incoming credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthProviderKind {
    /// Bearer JWT validated against the authority's JWKS.
    #[default]
    Oidc,
    /// Trusted `X-Test-User-*` headers. Never allowed in production.
    Header,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub provider: AuthProviderKind,
    /// OIDC issuer, e.g. `https://cognito-idp.<region>.amazonaws.com/<pool>`.
    #[serde(default)]
    pub authority: String,
    /// Expected `aud`. Empty skips audience validation.
    #[serde(default)]
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_true")]
    pub sample_kudos: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { sample_kudos: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// `*` or a comma-separated list of origins.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

impl CorsConfig {
    /// Explicit origins, or `None` when any origin is allowed.
    pub fn origin_list(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins)
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_connection_string() -> String {
    "mongodb://localhost:27017".to_string()
}
fn default_database_name() -> String {
    "kudos".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_cors_origins() -> String {
    "http://localhost:5173".to_string()
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (KUDOS__SECTION__KEY format)
    /// 2. config.toml file, or the file named by `KUDOS_CONFIG` (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("KUDOS_CONFIG").unwrap_or_else(|_| "config".to_string());
        let config = Self::builder()?
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix("KUDOS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file on top of the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = Self::builder()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("database.connection_string", default_connection_string())?
            .set_default("database.name", default_database_name())?
            .set_default("kudos.dry_run", false)?
            .set_default("logging.level", default_log_level())
    }

    /// Reject combinations that cannot start safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth.provider {
            AuthProviderKind::Oidc if self.auth.authority.trim().is_empty() => Err(
                ConfigError::Message("auth.authority is required for the oidc provider".to_string()),
            ),
            AuthProviderKind::Header if self.environment.is_production() => Err(
                ConfigError::Message("the header auth provider is not allowed in production".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Whether illustrative kudos should be seeded into an empty store.
    pub fn seeds_sample_kudos(&self) -> bool {
        self.seed.sample_kudos && !self.environment.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_server_config() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 5000);
        assert!(server.static_dir.is_none());
    }

    #[test]
    fn test_load_from_file_applies_defaults() {
        let file = write_config(
            r#"
            [auth]
            authority = "https://issuer.example.com"
            "#,
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.environment, DeploymentEnvironment::Development);
        assert_eq!(config.database.name, "kudos");
        assert_eq!(config.auth.provider, AuthProviderKind::Oidc);
        assert!(!config.kudos.dry_run);
        assert!(config.seeds_sample_kudos());
    }

    #[test]
    fn test_load_from_file_reads_sections() {
        let file = write_config(
            r#"
            environment = "testing"

            [database]
            connection_string = "memory://"
            name = "kudos-tests"

            [kudos]
            dry_run = true

            [auth]
            provider = "header"
            "#,
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.environment, DeploymentEnvironment::Testing);
        assert_eq!(config.database.connection_string, "memory://");
        assert_eq!(config.database.name, "kudos-tests");
        assert!(config.kudos.dry_run);
        assert_eq!(config.auth.provider, AuthProviderKind::Header);
    }

    #[test]
    fn test_oidc_requires_authority() {
        let file = write_config("[auth]\nprovider = \"oidc\"\n");
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_header_provider_refused_in_production() {
        let file = write_config("environment = \"production\"\n[auth]\nprovider = \"header\"\n");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("not allowed in production"));
    }

    #[test]
    fn test_production_never_seeds_sample_kudos() {
        let file = write_config(
            "environment = \"production\"\n[auth]\nauthority = \"https://issuer\"\n",
        );
        let config = Config::load_from(file.path()).unwrap();
        assert!(config.seed.sample_kudos);
        assert!(!config.seeds_sample_kudos());
    }

    #[test]
    fn test_cors_origin_list() {
        let any = CorsConfig { origins: "*".to_string() };
        assert!(any.origin_list().is_none());

        let listed = CorsConfig {
            origins: "http://localhost:5173, https://kudos.example.com".to_string(),
        };
        assert_eq!(
            listed.origin_list().unwrap(),
            vec!["http://localhost:5173", "https://kudos.example.com"]
        );
    }
}
