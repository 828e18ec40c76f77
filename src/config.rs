use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_local_runs";

/// Outbound SMTP settings. Invoice email is disabled when this block is absent.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Base currency prices are stored in
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Sales tax applied to website checkouts (0.0 - 1.0)
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub default_tax_rate: f64,

    /// Stripe endpoint signing secret (`whsec_...`)
    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,

    /// Paystack secret key, also used to sign webhooks
    #[serde(default)]
    pub paystack_secret_key: Option<String>,

    /// Maximum accepted age of a signed webhook timestamp
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,

    /// Upper bound on any outbound network call (SMTP)
    #[serde(default = "default_http_client_timeout_secs")]
    pub http_client_timeout_secs: u64,

    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    /// Creates a new configuration with defaults for every optional setting
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            default_currency: default_currency(),
            default_tax_rate: default_tax_rate(),
            stripe_webhook_secret: None,
            paystack_secret_key: None,
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
            http_client_timeout_secs: default_http_client_timeout_secs(),
            smtp: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_secs(self.http_client_timeout_secs)
    }

    /// Cross-field rules the derive cannot express
    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            errors.add(
                "cors_allowed_origins",
                invalid(
                    "cors_allowed_origins_required",
                    "outside development set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true",
                ),
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            errors.add(
                "jwt_secret",
                invalid(
                    "jwt_secret_default_dev",
                    "the bundled development secret is only accepted in development",
                ),
            );
        }
        if self.default_currency.trim().len() != 3 {
            errors.add(
                "default_currency",
                invalid("default_currency", "default_currency must be a 3-letter ISO code"),
            );
        }
        if let Some(smtp) = self.smtp.as_ref() {
            if smtp.host.trim().is_empty() || !smtp.from_email.contains('@') {
                errors.add(
                    "smtp",
                    invalid("smtp", "smtp.host and a valid smtp.from_email are required"),
                );
            }
        }
        if self.http_client_timeout_secs == 0 {
            errors.add(
                "http_client_timeout_secs",
                invalid("http_client_timeout_secs", "http_client_timeout_secs must be positive"),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_tax_rate() -> f64 {
    0.075
}

fn default_currency() -> String {
    "NGN".to_string()
}

fn default_webhook_tolerance_secs() -> u64 {
    300
}

fn default_http_client_timeout_secs() -> u64 {
    15
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Coffee Orders".to_string()
}

fn default_auth_issuer() -> String {
    "coffee-commerce-auth".to_string()
}

fn default_auth_audience() -> String {
    "coffee-commerce-api".to_string()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Secrets shipped in sample files that must never reach a deployment
const PLACEHOLDER_SECRETS: [&str; 3] = [
    "CHANGE_THIS_SECRET_IN_PRODUCTION",
    "your-secret-key",
    "default-secret-key",
];

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Ok(());
    }
    Err(invalid("log_level", "log_level must be one of trace, debug, info, warn, error"))
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let secret = secret.trim();
    if secret.len() < 64 {
        return Err(invalid("jwt_secret", "jwt_secret must be at least 64 characters"));
    }
    if PLACEHOLDER_SECRETS
        .iter()
        .any(|placeholder| secret.eq_ignore_ascii_case(placeholder))
    {
        return Err(invalid("jwt_secret", "jwt_secret is a placeholder value"));
    }
    let distinct: HashSet<char> = secret.chars().collect();
    if distinct.len() < 10 {
        return Err(invalid("jwt_secret", "jwt_secret needs at least 10 distinct characters"));
    }
    Ok(())
}

fn validate_tax_rate(rate: f64) -> Result<(), ValidationError> {
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        return Ok(());
    }
    Err(invalid("default_tax_rate", "default_tax_rate must be between 0.0 and 1.0"))
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("coffee_commerce_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Layered load: built-in defaults, then `config/default.toml`, then
/// `config/{RUN_ENV}.toml`, then `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!(environment = %run_env, "loading configuration");
    if !Path::new(CONFIG_DIR).exists() {
        info!(dir = CONFIG_DIR, "no config directory; using defaults and environment");
    }

    let layered = Config::builder()
        .set_default("database_url", "sqlite://coffee.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // jwt_secret has no default
    if layered.get_string("jwt_secret").is_err() {
        error!("jwt_secret missing; set APP__JWT_SECRET");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret (APP__JWT_SECRET)".into(),
        )));
    }

    let app_config: AppConfig = layered.try_deserialize()?;
    app_config
        .validate()
        .and_then(|_| app_config.validate_additional_constraints())
        .map_err(|e| {
            error!(errors = ?e, "configuration rejected");
            AppConfigError::Validation(e)
        })?;

    info!("configuration loaded");
    Ok(app_config)
}
