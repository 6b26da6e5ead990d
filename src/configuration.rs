use std::time::Duration;

use crate::error::ConfigError;

/// Signing secret used when none is configured.
///
/// INSECURE: anyone who reads this source can mint valid tokens. It exists so
/// a local checkout runs without setup and is rejected when
/// `application.environment` is `production`.
pub const INSECURE_DEVELOPMENT_SECRET: &str = "insecure-development-secret-change-me";

const MIN_PRODUCTION_SECRET_LENGTH: usize = 32;

/// Longest accepted token lifetime (one year, in seconds)
pub const MAX_TOKEN_LIFETIME: i64 = 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Production,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
}

impl ApplicationSettings {
    /// Auth cookies are only marked `Secure` in production
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    /// Upper bound for a single credential lookup during login
    pub lookup_timeout_ms: u64,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

/// Token signing settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,  // seconds (900 = 15 minutes)
    pub refresh_token_expiry: i64, // seconds (604800 = 7 days)
}

impl JwtSettings {
    pub fn uses_default_secret(&self) -> bool {
        self.secret == INSECURE_DEVELOPMENT_SECRET
    }
}

impl Settings {
    /// Reject settings that are unsafe for the configured environment
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.access_token_expiry <= 0 || self.jwt.refresh_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt token expiries must be positive".to_string(),
            ));
        }

        if self.jwt.access_token_expiry > MAX_TOKEN_LIFETIME
            || self.jwt.refresh_token_expiry > MAX_TOKEN_LIFETIME
        {
            return Err(ConfigError::InvalidValue(format!(
                "jwt token expiries must not exceed {} seconds",
                MAX_TOKEN_LIFETIME
            )));
        }

        if self.application.environment != Environment::Production {
            if self.jwt.uses_default_secret() {
                tracing::warn!("Using the insecure development signing secret");
            }
            return Ok(());
        }

        if self.jwt.secret.is_empty() || self.jwt.uses_default_secret() {
            return Err(ConfigError::MissingRequired(
                "jwt.secret must be set in production (APP_JWT__SECRET)".to_string(),
            ));
        }

        if self.jwt.secret.len() < MIN_PRODUCTION_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes in production",
                MIN_PRODUCTION_SECRET_LENGTH
            )));
        }

        Ok(())
    }
}

/// Load settings from `configuration.yaml` (optional) and `APP_*` variables
///
/// e.g. `APP_JWT__SECRET=...` or `APP_APPLICATION__ENVIRONMENT=production`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = sources()?.try_deserialize::<Settings>()?;
    Ok(settings)
}

fn sources() -> Result<config::Config, config::ConfigError> {
    config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("application.environment", "local")?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "ucms")?
        .set_default("database.lookup_timeout_ms", 5000)?
        .set_default("jwt.secret", INSECURE_DEVELOPMENT_SECRET)?
        .set_default("jwt.access_token_expiry", 900)?
        .set_default("jwt.refresh_token_expiry", 604800)?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
}
