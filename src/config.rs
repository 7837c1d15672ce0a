use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration, loaded from `config/{default,<env>}.toml`
/// layered with `APP__`-prefixed environment variables.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum number of pooled database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    /// JWT signing secret
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Payment gateway API base URL
    #[serde(default = "default_gateway_api_base")]
    pub gateway_api_base: String,

    /// Payment gateway secret API key
    #[serde(default)]
    pub gateway_secret_key: String,

    /// Shared secret for verifying inbound payment webhooks
    #[serde(default)]
    pub gateway_webhook_secret: String,

    /// Accepted clock skew for webhook signatures, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub gateway_webhook_tolerance_secs: u64,

    /// Where the gateway redirects the buyer after a successful payment
    pub checkout_success_url: String,

    /// Where the gateway redirects the buyer after cancelling
    pub checkout_cancel_url: String,

    /// Comma-separated list of allowed CORS origins; unset means permissive
    /// (development only)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_jwt_expiration() -> u64 {
    3600
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_gateway_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}
fn default_webhook_tolerance() -> u64 {
    300
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration for the environment selected by `RUN_ENV` / `APP_ENV`.
///
/// `jwt_secret` has no default on purpose: it must come from a config file or
/// the environment, so an insecure fallback can never reach production.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("checkout_success_url", "http://localhost:3000/orders")?
        .set_default("checkout_cancel_url", "http://localhost:3000/cart")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let cfg: AppConfig = config.try_deserialize()?;
    cfg.validate()?;

    info!(environment = %cfg.environment, "Configuration loaded");
    Ok(cfg)
}

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level when set and non-empty.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            db_max_connections: 5,
            db_min_connections: 1,
            auto_migrate: true,
            jwt_secret: "a".repeat(32),
            jwt_expiration: 3600,
            host: "127.0.0.1".into(),
            port: 8080,
            environment: "test".into(),
            log_level: "debug".into(),
            log_json: false,
            gateway_api_base: "https://api.stripe.com/v1".into(),
            gateway_secret_key: "sk_test_123".into(),
            gateway_webhook_secret: "whsec_123".into(),
            gateway_webhook_tolerance_secs: 300,
            checkout_success_url: "http://localhost/success".into(),
            checkout_cancel_url: "http://localhost/cancel".into(),
            cors_allowed_origins: None,
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_short_jwt_secret() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }
}
