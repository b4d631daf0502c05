use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{Environment, Error, Result, TradingMode};

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    pub account_id: u32,
    /// Coin to trade against USDT. `None` runs metadata-only.
    pub coin: Option<String>,
    pub trading_mode: TradingMode,
    pub credentials_path: String,
    pub margin_cooldown: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode = match required_env("TRADING_MODE").to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => panic!("ERROR: TRADING_MODE must be 'paper' or 'live', got: '{other}'"),
        };

        let account_id = optional_env("ARB_ACCOUNT_ID")
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .unwrap_or_else(|_| panic!("ARB_ACCOUNT_ID is not a number: '{v}'"))
            })
            .unwrap_or(3);

        Config {
            account_id,
            coin: optional_env("ARB_COIN")
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty()),
            trading_mode,
            credentials_path: optional_env("ARB_CREDENTIALS_PATH")
                .unwrap_or_else(|| "config/accounts.toml".to_string()),
            margin_cooldown: Duration::from_secs(
                optional_env("ARB_MARGIN_COOLDOWN_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(600),
            ),
            http_timeout: Duration::from_secs(
                optional_env("ARB_HTTP_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// API key triple plus the environment it is valid for.
/// Every key is required and unknown keys are rejected.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
    pub environment: Environment,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .field("environment", &self.environment)
            .finish()
    }
}

/// Resolves an account id to its credentials.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self, account_id: u32) -> Result<Credentials>;
}

/// Credentials read from a TOML file:
///
/// ```toml
/// [accounts.3]
/// api_key = "..."
/// secret_key = "..."
/// passphrase = "..."
/// environment = "sandbox"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialStore {
    #[serde(default)]
    accounts: HashMap<String, Credentials>,
}

impl CredentialStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }
}

impl CredentialProvider for CredentialStore {
    fn credentials(&self, account_id: u32) -> Result<Credentials> {
        self.accounts
            .get(&account_id.to_string())
            .cloned()
            .ok_or_else(|| Error::Credentials(format!("no credentials for account {account_id}")))
    }
}
