use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::scheduling::{ClockTime, TimeRange, WorkingWindow};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_workshop";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (Postgres in production, SQLite otherwise)
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT lifetime in seconds; only used when minting tokens for operators
    pub jwt_expiration: usize,

    pub host: String,

    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

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

    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool
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

    // ========== Maintenance gate ==========
    /// Endpoint that answers `{"valid": bool}` for a posted `{"api_key": ...}`
    #[serde(default)]
    pub api_key_validator_url: Option<String>,

    #[serde(default = "default_api_key_cache_ttl_secs")]
    pub api_key_cache_ttl_secs: u64,

    #[serde(default = "default_api_key_grace_period_secs")]
    pub api_key_grace_period_secs: u64,

    #[serde(default = "default_api_key_validation_timeout_secs")]
    #[validate(range(min = 1))]
    pub api_key_validation_timeout_secs: u64,

    // ========== Scheduling ==========
    #[serde(default = "default_working_day_start")]
    #[validate(custom = "validate_clock_time")]
    pub working_day_start: String,

    #[serde(default = "default_working_day_end")]
    #[validate(custom = "validate_clock_time")]
    pub working_day_end: String,

    #[serde(default = "default_slot_granularity_minutes")]
    #[validate(range(min = 1, max = 240))]
    pub slot_granularity_minutes: u32,

    #[serde(default = "default_walk_in_duration_minutes")]
    #[validate(range(min = 1, max = 720))]
    pub walk_in_duration_minutes: u32,

    /// Hours a technician can be booked per day, in minutes
    #[serde(default = "default_technician_daily_minutes")]
    #[validate(range(min = 1, max = 1440))]
    pub technician_daily_minutes: u32,

    #[serde(default = "default_break_start")]
    #[validate(custom = "validate_clock_time")]
    pub default_break_start: String,

    #[serde(default = "default_break_end")]
    #[validate(custom = "validate_clock_time")]
    pub default_break_end: String,
}

impl AppConfig {
    /// Builds a configuration with built-in defaults for everything but the
    /// connection, secret and environment.
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration: 3600,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
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
            api_key_validator_url: None,
            api_key_cache_ttl_secs: default_api_key_cache_ttl_secs(),
            api_key_grace_period_secs: default_api_key_grace_period_secs(),
            api_key_validation_timeout_secs: default_api_key_validation_timeout_secs(),
            working_day_start: default_working_day_start(),
            working_day_end: default_working_day_end(),
            slot_granularity_minutes: default_slot_granularity_minutes(),
            walk_in_duration_minutes: default_walk_in_duration_minutes(),
            technician_daily_minutes: default_technician_daily_minutes(),
            default_break_start: default_break_start(),
            default_break_end: default_break_end(),
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

    /// Opening hours and slot grid used by the availability calculator.
    pub fn working_window(&self) -> Result<WorkingWindow, crate::errors::ServiceError> {
        WorkingWindow::new(
            self.working_day_start.parse()?,
            self.working_day_end.parse()?,
            self.slot_granularity_minutes,
        )
    }

    /// Break applied to technicians without a personal one on record.
    pub fn default_break(&self) -> Result<TimeRange, crate::errors::ServiceError> {
        TimeRange::parse(&self.default_break_start, &self.default_break_end)
    }

    pub fn api_key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.api_key_cache_ttl_secs)
    }

    pub fn api_key_grace_period(&self) -> Duration {
        Duration::from_secs(self.api_key_grace_period_secs)
    }

    pub fn api_key_validation_timeout(&self) -> Duration {
        Duration::from_secs(self.api_key_validation_timeout_secs)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            errors.add(
                "cors_allowed_origins",
                invalid(
                    "cors_allowed_origins_required",
                    "set APP__CORS_ALLOWED_ORIGINS or opt in with APP__CORS_ALLOW_ANY_ORIGIN=true",
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
        if self.working_window().is_err() {
            errors.add(
                "working_day_end",
                invalid("working_day", "working_day_end must be later than working_day_start"),
            );
        }
        if self.default_break().is_err() {
            errors.add(
                "default_break_end",
                invalid("default_break", "default_break_end must be later than default_break_start"),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
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

fn default_api_key_cache_ttl_secs() -> u64 {
    30
}
fn default_api_key_grace_period_secs() -> u64 {
    60 * 60
}
fn default_api_key_validation_timeout_secs() -> u64 {
    10
}

fn default_working_day_start() -> String {
    "07:00".to_string()
}
fn default_working_day_end() -> String {
    "18:00".to_string()
}
fn default_slot_granularity_minutes() -> u32 {
    30
}
fn default_walk_in_duration_minutes() -> u32 {
    60
}
fn default_technician_daily_minutes() -> u32 {
    8 * 60
}
fn default_break_start() -> String {
    "12:00".to_string()
}
fn default_break_end() -> String {
    "13:00".to_string()
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(invalid("log_level", "one of trace, debug, info, warn, error")),
    }
}

fn validate_clock_time(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<ClockTime>()
        .map(|_| ())
        .map_err(|_| invalid("clock_time", "time of day in HH:MM format"))
}

/// Rejects placeholder and low-entropy signing secrets.
fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    const PLACEHOLDERS: [&str; 3] = [
        "CHANGE_THIS_SECRET_IN_PRODUCTION",
        "your-secret-key",
        "default-secret-key",
    ];
    let secret = secret.trim();
    let distinct = secret.chars().collect::<std::collections::HashSet<_>>().len();

    if secret.len() < 64 {
        Err(invalid("jwt_secret", "at least 64 characters"))
    } else if PLACEHOLDERS.iter().any(|p| secret.eq_ignore_ascii_case(p)) {
        Err(invalid("jwt_secret", "placeholder secrets are not accepted"))
    } else if distinct < 10 {
        Err(invalid("jwt_secret", "at least 10 distinct characters"))
    } else {
        Ok(())
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("workshop_api={},tower_http=debug", level);
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

/// Layers built-in defaults, `config/default.toml`, `config/<RUN_ENV>.toml`
/// and `APP__*` environment variables, later sources winning.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    if !Path::new(CONFIG_DIR).exists() {
        info!(dir = CONFIG_DIR, "no config directory, using defaults and APP__* variables");
    }

    let layered = Config::builder()
        .set_default("database_url", "sqlite://workshop.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // no built-in secret: it has to come from a file or APP__JWT_SECRET
    if layered.get_string("jwt_secret").is_err() {
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret (set APP__JWT_SECRET)".into(),
        )));
    }

    let cfg: AppConfig = layered.try_deserialize()?;
    cfg.validate()
        .and_then(|()| cfg.validate_additional_constraints())
        .map_err(|e| {
            error!(errors = %e, run_env = %run_env, "rejected configuration");
            AppConfigError::Validation(e)
        })?;

    info!(run_env = %run_env, environment = %cfg.environment, "configuration loaded");
    Ok(cfg)
}
