//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::ledger::horizon::{HorizonSettings, DEFAULT_FRIENDBOT_URL};
use crate::session::SessionSettings;
use crate::wallet::persistence::{DEFAULT_SECRET_PREFIX, DEFAULT_WALLET_KEY};
use crate::wallet::{Network, StorageKeys};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    /// Network for a new wallet: "PUBLIC" or "TESTNET"
    #[serde(default = "default_network")]
    pub default: String,
    #[serde(default)]
    pub public_gateway_url: Option<String>,
    #[serde(default)]
    pub testnet_gateway_url: Option<String>,
    #[serde(default = "default_friendbot_url")]
    pub friendbot_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Time budget for retrying a failed gateway read
    #[serde(default = "default_retry_max_elapsed_ms")]
    pub retry_max_elapsed_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            default: default_network(),
            public_gateway_url: None,
            testnet_gateway_url: None,
            friendbot_url: default_friendbot_url(),
            timeout_ms: default_timeout_ms(),
            retry_max_elapsed_ms: default_retry_max_elapsed_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CipherKind {
    /// Secrets stored as-is
    Plaintext,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// JSON file backing the key-value store
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_wallet_key")]
    pub wallet_key: String,
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,
    #[serde(default = "default_cipher")]
    pub cipher: CipherKind,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            wallet_key: default_wallet_key(),
            secret_prefix: default_secret_prefix(),
            cipher: default_cipher(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_refresh_after_payment_ms")]
    pub refresh_after_payment_ms: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_after_payment_ms: default_refresh_after_payment_ms(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_network() -> String {
    Network::Testnet.to_string()
}

fn default_friendbot_url() -> String {
    DEFAULT_FRIENDBOT_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_max_elapsed_ms() -> u64 {
    5_000
}

fn default_storage_path() -> String {
    "wallet.json".to_string()
}

fn default_wallet_key() -> String {
    DEFAULT_WALLET_KEY.to_string()
}

fn default_secret_prefix() -> String {
    DEFAULT_SECRET_PREFIX.to_string()
}

fn default_cipher() -> CipherKind {
    CipherKind::Plaintext
}

fn default_refresh_after_payment_ms() -> u64 {
    2_000
}

fn default_history_limit() -> u32 {
    10
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("network.default", default_network())?
            .set_default("network.timeout_ms", default_timeout_ms() as i64)?
            .set_default("storage.path", default_storage_path())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (QASTRA__SECTION__KEY)
            .add_source(
                config::Environment::with_prefix("QASTRA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.default_network()?;

        for url in [
            self.network.public_gateway_url.as_deref(),
            self.network.testnet_gateway_url.as_deref(),
            Some(self.network.friendbot_url.as_str()),
        ]
        .into_iter()
        .flatten()
        {
            url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
        }

        if self.network.timeout_ms == 0 {
            anyhow::bail!("network.timeout_ms must be positive");
        }

        if self.storage.path.trim().is_empty() {
            anyhow::bail!("storage.path cannot be empty");
        }

        if self.storage.wallet_key.is_empty() || self.storage.secret_prefix.is_empty() {
            anyhow::bail!("storage.wallet_key and storage.secret_prefix cannot be empty");
        }

        if self.storage.secret_prefix.starts_with(&self.storage.wallet_key) {
            anyhow::bail!("storage.secret_prefix must not start with storage.wallet_key");
        }

        if self.session.history_limit == 0 || self.session.history_limit > 200 {
            anyhow::bail!("session.history_limit must be between 1 and 200");
        }

        if self.storage.cipher == CipherKind::Plaintext {
            tracing::warn!("Secret keys are stored unencrypted (storage.cipher = plaintext)");
        }

        Ok(())
    }

    pub fn default_network(&self) -> Result<Network> {
        self.network
            .default
            .parse()
            .map_err(|e| anyhow::anyhow!("network.default: {}", e))
    }

    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys {
            wallet_key: self.storage.wallet_key.clone(),
            secret_prefix: self.storage.secret_prefix.clone(),
        }
    }

    pub fn horizon_settings(&self) -> HorizonSettings {
        HorizonSettings {
            timeout: Duration::from_millis(self.network.timeout_ms),
            retry_budget: Duration::from_millis(self.network.retry_max_elapsed_ms),
            friendbot_url: self.network.friendbot_url.clone(),
        }
    }

    pub fn session_settings(&self) -> Result<SessionSettings> {
        Ok(SessionSettings {
            default_network: self.default_network()?,
            public_gateway_url: self.network.public_gateway_url.clone(),
            testnet_gateway_url: self.network.testnet_gateway_url.clone(),
            refresh_after_payment: Duration::from_millis(self.session.refresh_after_payment_ms),
        })
    }

    /// Get masked configuration for display (hide credentials)
    pub fn masked_display(&self) -> String {
        let gateway = |url: &Option<String>, network: Network| {
            mask_url(url.as_deref().unwrap_or(network.default_gateway_url()))
        };

        format!(
            r#"Configuration:
  Network:
    default: {}
    public_gateway: {}
    testnet_gateway: {}
    friendbot: {}
    timeout: {}ms
    retry_budget: {}ms
  Storage:
    path: {}
    wallet_key: {}
    secret_prefix: {}
    cipher: {:?}
  Session:
    refresh_after_payment: {}ms
    history_limit: {}
"#,
            self.network.default,
            gateway(&self.network.public_gateway_url, Network::Public),
            gateway(&self.network.testnet_gateway_url, Network::Testnet),
            mask_url(&self.network.friendbot_url),
            self.network.timeout_ms,
            self.network.retry_max_elapsed_ms,
            self.storage.path,
            self.storage.wallet_key,
            self.storage.secret_prefix,
            self.storage.cipher,
            self.session.refresh_after_payment_ms,
            self.session.history_limit,
        )
    }
}

/// Mask URL for display (hide API keys in query params and userinfo)
fn mask_url(url: &str) -> String {
    let base = match url.find('?') {
        Some(idx) => format!("{}?***", &url[..idx]),
        None => url.to_string(),
    };

    match (base.find("://"), base.find('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***@{}", &base[..scheme], &base[at + 1..])
        }
        _ => base,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkSettings::default(),
            storage: StorageSettings::default(),
            session: SessionConfig::default(),
        }
    }
}
