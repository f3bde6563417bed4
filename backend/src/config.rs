//! Configuration management for the shop platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SHOP_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Payment gateway configuration
    pub payment: PaymentConfig,

    /// Request audit trail
    pub audit: AuditConfig,

    /// Customer and staff notifications
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Gateway REST base URL
    pub api_base: String,

    /// Gateway secret API key
    pub secret_key: String,

    /// Shared secret for webhook signatures
    pub webhook_secret: String,

    /// ISO currency code sent with checkout sessions
    pub currency: String,

    /// Storefront URL used for checkout success/cancel redirects
    pub frontend_url: String,

    /// Maximum accepted age of a signed webhook, in seconds
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// HTTP mail relay endpoint; empty disables delivery
    pub relay_url: String,

    /// Sender address on outgoing mail
    pub from_address: String,

    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("SHOP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("payment.api_base", "https://api.stripe.com/v1")?
            .set_default("payment.secret_key", "")?
            .set_default("payment.webhook_secret", "")?
            .set_default("payment.currency", "usd")?
            .set_default("payment.frontend_url", "http://localhost:3000")?
            .set_default("payment.webhook_tolerance_secs", 300)?
            .set_default("audit.enabled", true)?
            .set_default("notifications.relay_url", "")?
            .set_default("notifications.from_address", "no-reply@shop.local")?
            .set_default("notifications.timeout_secs", 5)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SHOP_ prefix)
            .add_source(
                Environment::with_prefix("SHOP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}
