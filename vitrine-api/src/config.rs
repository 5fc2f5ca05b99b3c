/// Configuration management for the API server
///
/// Loaded from environment variables (a `.env` file is honored in
/// development via dotenvy).
///
/// # Environment Variables
///
/// Required:
/// - `DATABASE_URL`: PostgreSQL connection string
/// - `SMTP_HOST`, `SMTP_USER`, `SMTP_PASSWORD`, `ADMIN_EMAIL`: outbound mail
///
/// Optional (defaults in parentheses):
/// - `API_HOST` (0.0.0.0), `API_PORT` (8080)
/// - `DATABASE_MAX_CONNECTIONS` (10)
/// - `SMTP_PORT` (587), `EMAIL_FROM_NAME` (Vitrine)
/// - `AUTO_SIGN_IN` (true), `REQUIRE_EMAIL_VERIFICATION` (true)
/// - `VERIFICATION_TOKEN_TTL_SECONDS` (3600), `RESET_TOKEN_TTL_SECONDS` (3600)
/// - `SESSION_TTL_HOURS` (24), `REMEMBER_SESSION_TTL_DAYS` (30)
/// - `MIN_PASSWORD_LENGTH` (8)
/// - `SWEEP_INTERVAL_SECONDS` (3600)
/// - `RUST_LOG`: log filter
use serde::{Deserialize, Serialize};
use std::env;
use vitrine_core::auth::AuthPolicy;
use vitrine_core::db::DatabaseConfig;
use vitrine_core::email::SmtpConfig;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Outbound mail configuration
    pub smtp: SmtpConfig,

    /// Auth policy knobs
    pub auth: AuthPolicy,

    /// Period of the expired-credential sweeper, in seconds
    pub sweep_interval_seconds: u64,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("{key} environment variable is required"))
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env if present (for development)
        dotenvy::dotenv().ok();

        let api = ApiConfig {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("API_PORT", 8080)?,
        };

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            ..Default::default()
        };

        let smtp = SmtpConfig {
            host: required("SMTP_HOST")?,
            port: env_or("SMTP_PORT", 587)?,
            username: required("SMTP_USER")?,
            password: required("SMTP_PASSWORD")?,
            from_email: required("ADMIN_EMAIL")?,
            from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Vitrine".to_string()),
        };

        let auth = AuthPolicy {
            auto_sign_in: env_or("AUTO_SIGN_IN", true)?,
            require_email_verification: env_or("REQUIRE_EMAIL_VERIFICATION", true)?,
            verification_ttl: chrono::Duration::seconds(env_or(
                "VERIFICATION_TOKEN_TTL_SECONDS",
                3600i64,
            )?),
            reset_ttl: chrono::Duration::seconds(env_or("RESET_TOKEN_TTL_SECONDS", 3600i64)?),
            session_ttl: chrono::Duration::hours(env_or("SESSION_TTL_HOURS", 24i64)?),
            remember_session_ttl: chrono::Duration::days(env_or(
                "REMEMBER_SESSION_TTL_DAYS",
                30i64,
            )?),
            refresh_sessions: env_or("REFRESH_SESSIONS", true)?,
            min_password_length: env_or("MIN_PASSWORD_LENGTH", 8usize)?,
        };

        Ok(Self {
            api,
            database,
            smtp,
            auth,
            sweep_interval_seconds: env_or("SWEEP_INTERVAL_SECONDS", 3600)?,
        })
    }

    /// Returns the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
