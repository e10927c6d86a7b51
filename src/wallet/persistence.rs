//! Wallet persistence
//!
//! Maps the wallet snapshot and per-account secrets onto a key-value store.
//! Secrets live under their own keys and never appear in the snapshot.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, SecretCipher};

use super::types::WalletSnapshot;

/// Default key holding the wallet snapshot
pub const DEFAULT_WALLET_KEY: &str = "starcade_wallet";

/// Default prefix for per-account secret keys
pub const DEFAULT_SECRET_PREFIX: &str = "starcade_key_";

/// Storage key layout
///
/// Part of the on-disk contract: changing it orphans existing wallets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub wallet_key: String,
    pub secret_prefix: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            wallet_key: DEFAULT_WALLET_KEY.to_string(),
            secret_prefix: DEFAULT_SECRET_PREFIX.to_string(),
        }
    }
}

impl StorageKeys {
    /// Key holding the secret for `public_key`
    pub fn secret_key(&self, public_key: &str) -> String {
        format!("{}{}", self.secret_prefix, public_key)
    }
}

/// Reads and writes wallet state
#[derive(Clone)]
pub struct WalletPersistence {
    store: Arc<dyn KeyValueStore>,
    cipher: Arc<dyn SecretCipher>,
    keys: StorageKeys,
}

impl WalletPersistence {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        cipher: Arc<dyn SecretCipher>,
        keys: StorageKeys,
    ) -> Self {
        Self {
            store,
            cipher,
            keys,
        }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Save wallet state (without private keys)
    pub async fn save(&self, snapshot: &WalletSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| Error::Serialization(format!("Failed to serialize wallet: {}", e)))?;

        self.store.set(&self.keys.wallet_key, &json).await?;

        debug!(
            "Saved wallet: {} accounts, active #{}, {}",
            snapshot.accounts.len(),
            snapshot.active_account_index,
            snapshot.network
        );
        Ok(())
    }

    /// Load wallet state, `None` if nothing was ever saved
    pub async fn load(&self) -> Result<Option<WalletSnapshot>> {
        let Some(data) = self.store.get(&self.keys.wallet_key).await? else {
            return Ok(None);
        };

        let snapshot: WalletSnapshot = serde_json::from_str(&data)
            .map_err(|e| Error::CorruptState(format!("Failed to parse wallet: {}", e)))?;

        if !snapshot.index_in_bounds() {
            return Err(Error::CorruptState(format!(
                "active account index {} with {} accounts",
                snapshot.active_account_index,
                snapshot.accounts.len()
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for account in &snapshot.accounts {
            if !seen.insert(account.public_key.as_str()) {
                return Err(Error::CorruptState(format!(
                    "duplicate account {}",
                    account.public_key
                )));
            }
        }

        info!("Loaded wallet with {} accounts", snapshot.accounts.len());
        Ok(Some(snapshot))
    }

    /// Seal and store the secret for an account
    pub async fn save_secret(&self, public_key: &str, secret: &str) -> Result<()> {
        let sealed = self.cipher.seal(public_key, secret)?;
        self.store
            .set(&self.keys.secret_key(public_key), &sealed)
            .await?;
        debug!("Stored secret for {}", public_key);
        Ok(())
    }

    /// Load and open the secret for an account, `None` if absent
    pub async fn load_secret(&self, public_key: &str) -> Result<Option<String>> {
        let Some(sealed) = self.store.get(&self.keys.secret_key(public_key)).await? else {
            return Ok(None);
        };

        let secret = self.cipher.open(public_key, &sealed).map_err(|e| {
            warn!("Secret for {} could not be opened", public_key);
            Error::CorruptState(format!("secret for {}: {}", public_key, e))
        })?;
        Ok(Some(secret))
    }

    pub async fn remove_secret(&self, public_key: &str) -> Result<()> {
        self.store.remove(&self.keys.secret_key(public_key)).await?;
        debug!("Removed secret for {}", public_key);
        Ok(())
    }

    /// Erase all wallet data, secrets included
    pub async fn clear_all(&self) -> Result<()> {
        warn!("Clearing all wallet data");
        self.store.clear().await
    }
}
