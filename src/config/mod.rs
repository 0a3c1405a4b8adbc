use alloy::primitives::Address;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// HTTP JSON-RPC endpoint used for reads and transaction submission
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Chain id (Scroll Sepolia by default)
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Prediction market contract
    pub market_address: Address,
    /// Wagering token (6-decimal stablecoin)
    pub token_address: Address,
    /// Block explorer base URL, used for transaction links in logs
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Hex private key - loaded from env YESNO_PRIVATE_KEY, never from file
    #[serde(skip)]
    pub private_key: Option<String>,
    /// Connect the wallet on startup when a key is present.
    #[serde(default)]
    pub auto_connect: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Background market refresh interval. 0 disables background refresh.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_rpc_url() -> String {
    "https://sepolia-rpc.scroll.io".to_string()
}
fn default_chain_id() -> u64 {
    534351
}
fn default_explorer_url() -> String {
    "https://sepolia.scrollscan.com".to_string()
}
fn default_refresh_interval() -> u64 {
    15
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Secrets come from the environment only
        config.wallet.private_key = env_key();
        if let Ok(url) = std::env::var("YESNO_RPC_URL") {
            config.chain.rpc_url = url;
        }

        Ok(config)
    }

    /// Build a config from environment variables alone (no file needed).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            chain: ChainConfig {
                rpc_url: std::env::var("YESNO_RPC_URL").unwrap_or_else(|_| default_rpc_url()),
                chain_id: std::env::var("YESNO_CHAIN_ID")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_chain_id),
                market_address: env_address("YESNO_MARKET_ADDRESS", "chain.market_address")?,
                token_address: env_address("YESNO_TOKEN_ADDRESS", "chain.token_address")?,
                explorer_url: std::env::var("YESNO_EXPLORER_URL")
                    .unwrap_or_else(|_| default_explorer_url()),
            },
            wallet: WalletConfig {
                private_key: env_key(),
                auto_connect: std::env::var("YESNO_AUTO_CONNECT")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            },
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.private_key.is_some()
    }

    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, hash: impl std::fmt::Display) -> String {
        format!("{}/tx/{}", self.chain.explorer_url.trim_end_matches('/'), hash)
    }
}

fn env_key() -> Option<String> {
    std::env::var("YESNO_PRIVATE_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
}

fn env_address(var: &str, field: &'static str) -> Result<Address, ConfigError> {
    let value = std::env::var(var).unwrap_or_default();
    Address::from_str(value.trim()).map_err(|_| ConfigError::InvalidAddress { field, value })
}
