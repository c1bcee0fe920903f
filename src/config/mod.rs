use anyhow::{Context, Result};

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
}

/// Requests-per-second quota applied to the auth routes, keyed per client IP.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub auth_rps: u32,
    pub auth_burst: u32,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_rps: 10,
            auth_burst: 20,
            enabled: true,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        Ok(Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: env_or("SERVER_PORT", "5000")
                    .parse()
                    .context("SERVER_PORT must be a number")?,
            },
            database: DatabaseConfig {
                url: database_url,
                pool_size: env_or("DATABASE_POOL_SIZE", "10")
                    .parse()
                    .context("DATABASE_POOL_SIZE must be a number")?,
            },
            auth: AuthConfig {
                jwt_secret,
                jwt_expiry_hours: env_or("JWT_EXPIRY_HOURS", "24")
                    .parse()
                    .context("JWT_EXPIRY_HOURS must be a number")?,
            },
            rate_limit: RateLimitConfig {
                auth_rps: env_or("AUTH_RATE_LIMIT_RPS", "10")
                    .parse()
                    .context("AUTH_RATE_LIMIT_RPS must be a number")?,
                auth_burst: env_or("AUTH_RATE_LIMIT_BURST", "20")
                    .parse()
                    .context("AUTH_RATE_LIMIT_BURST must be a number")?,
                enabled: env_or("AUTH_RATE_LIMIT_ENABLED", "true") == "true",
            },
        })
    }
}
