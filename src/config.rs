//! Server configuration loaded from the environment.
//!
//! `.env` is read first (if present), then:
//!
//! - `DATABASE_URL` (required) - MongoDB connection string
//! - `JWT_SECRET` (required) - token signing secret, at least 32 characters
//! - `DATABASE_NAME` - default `nilhub`
//! - `HOST` / `PORT` - default `127.0.0.1:8080`
//! - `JWT_EXPIRES_IN_DAYS` - default 7, at most 3650
//! - `APP_ENV` - `production` hides error details, anything else shows them
//! - `MAX_FILE_SIZE_MB` / `MAX_FILES` - upload limits, default 5 / 5
//! - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET`

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Upper bound for `JWT_EXPIRES_IN_DAYS` (ten years).
pub const MAX_TOKEN_DAYS: i64 = 3650;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),
}

/// Operating mode. Only decides how much error detail reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }
}

/// Limits applied to multipart image uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size_mb: usize,
    pub max_files: usize,
}

impl UploadLimits {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size_mb: 5,
            max_files: 5,
        }
    }
}

#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_expires_in_days: i64,
    pub environment: Environment,
    pub uploads: UploadLimits,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &"[REDACTED]")
            .field("database_name", &self.database_name)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expires_in_days", &self.jwt_expires_in_days)
            .field("environment", &self.environment)
            .field("uploads", &self.uploads)
            .field("cloudinary", &self.cloudinary)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing, a number does
    /// not parse, or the JWT secret is too short to be trusted.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. `from_env` delegates here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingEnvVar(key))
        };

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InvalidEnvVar(
                "JWT_SECRET",
                format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
            ));
        }

        let cloudinary = match (
            lookup("CLOUDINARY_CLOUD_NAME"),
            lookup("CLOUDINARY_API_KEY"),
            lookup("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let jwt_expires_in_days: i64 = parse_or(&lookup, "JWT_EXPIRES_IN_DAYS", 7)?;
        if !(1..=MAX_TOKEN_DAYS).contains(&jwt_expires_in_days) {
            return Err(ConfigError::InvalidEnvVar(
                "JWT_EXPIRES_IN_DAYS",
                format!("must be between 1 and {MAX_TOKEN_DAYS}"),
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            database_url: required("DATABASE_URL")?,
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "nilhub".to_string()),
            jwt_secret,
            jwt_expires_in_days,
            environment: Environment::from_value(&lookup("APP_ENV").unwrap_or_default()),
            uploads: UploadLimits {
                max_file_size_mb: parse_or(&lookup, "MAX_FILE_SIZE_MB", 5)?,
                max_files: parse_or(&lookup, "MAX_FILES", 5)?,
            },
            cloudinary,
        })
    }

    /// Whether error responses carry debug details.
    pub fn detailed_errors(&self) -> bool {
        self.environment != Environment::Production
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key, e.to_string())),
        None => Ok(default),
    }
}
