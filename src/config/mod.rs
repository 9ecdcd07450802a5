use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HMAC secret shared with the authentication service that mints bearer tokens.
    pub token_secret: Secret<String>,
    pub token_issuer: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayProvider {
    Razorpay,
    Sandbox,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub provider: GatewayProvider,
    /// Publishable key handed to the client for checkout.
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    pub currency: String,
    pub timeout_secs: u64,
    pub signature_header: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommissionConfig {
    /// Percent retained by the platform from a seller's share when no override exists.
    pub default_seller_rate: f64,
    /// Percent of the order total paid to the assigned delivery partner.
    pub delivery_partner_rate: f64,
    #[serde(default)]
    pub seller_rates: HashMap<Uuid, f64>,
    #[serde(default)]
    pub auto_credit: bool,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            default_seller_rate: 10.0,
            delivery_partner_rate: 5.0,
            seller_rates: HashMap::new(),
            auto_credit: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub poll_interval_secs: u64,
    pub batch_size: i64,
    pub max_attempts: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            batch_size: 25,
            max_attempts: 8,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://bazaar.db")?
            .set_default("database.max_connections", 10)?
            .set_default("database.busy_timeout_ms", 5000)?
            .set_default("auth.token_issuer", "bazaar-auth")?
            .set_default("gateway.provider", "sandbox")?
            .set_default("gateway.api_base_url", "https://api.razorpay.com/v1")?
            .set_default("gateway.currency", "INR")?
            .set_default("gateway.timeout_secs", 10)?
            .set_default("gateway.signature_header", "x-razorpay-signature")?
            .set_default("commission.default_seller_rate", 10.0)?
            .set_default("commission.delivery_partner_rate", 5.0)?
            .set_default("commission.auto_credit", false)?
            .set_default("worker.poll_interval_secs", 30)?
            .set_default("worker.batch_size", 25)?
            .set_default("worker.max_attempts", 8)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Environment variables use the BAZAAR__ prefix, double underscore separates levels
            .add_source(Environment::with_prefix("BAZAAR").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://bazaar.db".to_string(),
                max_connections: 10,
                busy_timeout_ms: 5000,
            },
            auth: AuthConfig {
                token_secret: Secret::new("change-me-in-production".to_string()),
                token_issuer: "bazaar-auth".to_string(),
            },
            gateway: GatewayConfig {
                provider: GatewayProvider::Sandbox,
                key_id: "rzp_test_sandbox".to_string(),
                key_secret: Secret::new("sandbox-key-secret".to_string()),
                webhook_secret: Secret::new("sandbox-webhook-secret".to_string()),
                api_base_url: "https://api.razorpay.com/v1".to_string(),
                currency: "INR".to_string(),
                timeout_secs: 10,
                signature_header: "x-razorpay-signature".to_string(),
            },
            commission: CommissionConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}
