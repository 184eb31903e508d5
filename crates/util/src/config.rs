use std::{env, fmt, net::SocketAddr};

use super::{database_url, server_bind_address};

/// Secret used to verify session tokens when `APP_SESSION_SECRET` is unset outside production.
const DEVELOPMENT_SESSION_SECRET: &[u8] = b"hireboard-development-session-secret";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub session_secret: Vec<u8>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("session_secret", &"***")
            .finish()
    }
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let session_secret = session_secret(environment)?;

        Ok(Self {
            bind_addr,
            environment,
            database_url: database_url(),
            session_secret,
        })
    }
}

/// Decodes `APP_SESSION_SECRET` (hex). Only production insists on it being set.
fn session_secret(environment: Environment) -> Result<Vec<u8>, ConfigError> {
    match env::var("APP_SESSION_SECRET") {
        Ok(raw) if !raw.trim().is_empty() => {
            let secret = hex::decode(raw.trim()).map_err(ConfigError::InvalidSessionSecret)?;
            if secret.is_empty() {
                return Err(ConfigError::MissingSessionSecret);
            }
            Ok(secret)
        }
        _ if environment == Environment::Production => Err(ConfigError::MissingSessionSecret),
        _ => Ok(DEVELOPMENT_SESSION_SECRET.to_vec()),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingSessionSecret,
    InvalidSessionSecret(hex::FromHexError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingSessionSecret => {
                write!(f, "APP_SESSION_SECRET must be set in production")
            }
            Self::InvalidSessionSecret(err) => {
                write!(f, "APP_SESSION_SECRET must be hex encoded: {err}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
