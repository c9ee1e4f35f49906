use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// HMAC key for CSRF token signing. Must be shared across instances in
    /// a horizontally-scaled deployment.
    pub csrf_secret: String,
    /// Path prefixes exempt from CSRF validation. Keep this list short:
    /// every entry reopens the hole this middleware exists to close.
    pub csrf_exempt_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Absolute session lifetime, set once at record creation.
    pub ttl_days: i64,
    /// Upper bound on any single session-store call.
    pub store_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: bool,
}

impl SessionServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = SessionServiceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("session-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_env("OTLP_ENDPOINT", Some("http://tempo:4317"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .unwrap_or(1),
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", None, is_prod)?,
                access_token_expiry_minutes: get_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                csrf_secret: load_csrf_secret(is_prod)?,
                csrf_exempt_paths: get_env(
                    "CSRF_EXEMPT_PATHS",
                    Some("/auth/,/documents/upload"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            session: SessionConfig {
                ttl_days: get_env("SESSION_TTL_DAYS", Some("7"), is_prod)?
                    .parse()
                    .unwrap_or(7),
                store_timeout_ms: get_env("SESSION_STORE_TIMEOUT_MS", Some("2000"), is_prod)?
                    .parse()
                    .unwrap_or(2000),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(!is_prod),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session.ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_DAYS must be positive"
            )));
        }

        if self.security.csrf_secret.len() < 32 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CSRF_SECRET_KEY must be at least 32 characters"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

/// The CSRF signing key is required in production: a randomly-generated
/// per-process key breaks validation as soon as a second instance serves
/// traffic. In dev a random key is generated so local setups work out of
/// the box.
fn load_csrf_secret(is_prod: bool) -> Result<String, AppError> {
    match env::var("CSRF_SECRET_KEY") {
        Ok(secret) => Ok(secret),
        Err(_) if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
            "CSRF_SECRET_KEY is required in production but not set"
        ))),
        Err(_) => {
            tracing::warn!(
                "CSRF_SECRET_KEY not set; generated a random per-process key. \
                 This only works for single-instance deployments."
            );
            Ok(service_core::utils::signature::generate_token())
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
