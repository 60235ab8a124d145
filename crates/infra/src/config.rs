//! Configuration loading and representation.
//!
//! Everything comes from environment variables. [`AppConfig::from_lookup`]
//! takes any lookup function so tests never touch the process environment.

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use orderdesk_inventory::{AvailabilityMode, DeductionMode, HttpGatewayConfig};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_APP_ENV: &str = "development";
pub const DEFAULT_INVENTORY_URL: &str = "http://localhost:8081/api";
pub const DEFAULT_INVENTORY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{var} must be set when {because}")]
    Missing { var: &'static str, because: &'static str },
}

/// Where orders are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub availability_mode: AvailabilityMode,
    pub deduction_mode: DeductionMode,
}

impl InventoryConfig {
    pub fn gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig::new(self.base_url.clone())
            .with_timeout(self.timeout)
            .with_availability_mode(self.availability_mode)
            .with_deduction_mode(self.deduction_mode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub app_env: String,
    pub storage: StorageBackend,
    pub inventory: InventoryConfig,
    /// Check availability before accepting a new order.
    pub inventory_check_on_create: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_var(&get, "PORT", DEFAULT_PORT)?;
        let app_env = get("APP_ENV").unwrap_or_else(|| DEFAULT_APP_ENV.to_string());

        let use_persistent = parse_bool(&get, "USE_PERSISTENT_STORES", false)?;
        let storage = match (use_persistent, get("DATABASE_URL")) {
            (false, _) => StorageBackend::InMemory,
            (true, Some(database_url)) => StorageBackend::Postgres { database_url },
            (true, None) => {
                return Err(ConfigError::Missing {
                    var: "DATABASE_URL",
                    because: "USE_PERSISTENT_STORES=true",
                });
            }
        };

        let timeout_ms = parse_var(&get, "INVENTORY_TIMEOUT_MS", DEFAULT_INVENTORY_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "INVENTORY_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }

        let inventory = InventoryConfig {
            base_url: get("INVENTORY_SERVICE_URL").unwrap_or_else(|| DEFAULT_INVENTORY_URL.to_string()),
            timeout: Duration::from_millis(timeout_ms),
            availability_mode: parse_var(&get, "INVENTORY_AVAILABILITY_MODE", AvailabilityMode::PerItem)?,
            deduction_mode: parse_var(&get, "INVENTORY_DEDUCTION_MODE", DeductionMode::Put)?,
        };

        Ok(Self {
            port,
            app_env,
            storage,
            inventory,
            inventory_check_on_create: parse_bool(&get, "INVENTORY_CHECK_ON_CREATE", true)?,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

fn parse_var<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value,
                reason: "expected true or false".to_string(),
            }),
        },
    }
}
