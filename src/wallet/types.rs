//! Core types for wallet state
//!
//! Defines accounts, the persisted wallet snapshot, networks and payment
//! intents.

use serde::{Deserialize, Serialize};

/// Balance shown for accounts that have never been fetched or are unfunded
pub const ZERO_BALANCE: &str = "0.00";

/// Ledger network selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    /// Production network
    Public,

    /// Test network (friendbot funding available)
    Testnet,
}

impl Network {
    /// The other network
    pub fn toggled(self) -> Self {
        match self {
            Network::Public => Network::Testnet,
            Network::Testnet => Network::Public,
        }
    }

    /// Passphrase mixed into every transaction signature
    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Public => "Public Global Stellar Network ; September 2015",
            Network::Testnet => "Test SDF Network ; September 2015",
        }
    }

    /// Default Horizon gateway for this network
    pub fn default_gateway_url(&self) -> &'static str {
        match self {
            Network::Public => "https://horizon.stellar.org",
            Network::Testnet => "https://horizon-testnet.stellar.org",
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Testnet
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Public => write!(f, "PUBLIC"),
            Network::Testnet => write!(f, "TESTNET"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" | "MAINNET" => Ok(Network::Public),
            "TESTNET" => Ok(Network::Testnet),
            other => Err(crate::error::Error::Config(format!(
                "Unknown network: {}",
                other
            ))),
        }
    }
}

/// Network selection plus optional gateway override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: Network,

    /// Overrides the network's default gateway
    pub gateway_url: Option<String>,
}

impl NetworkConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            gateway_url: None,
        }
    }

    pub fn with_gateway(network: Network, gateway_url: Option<String>) -> Self {
        Self {
            network,
            gateway_url,
        }
    }

    /// Gateway to use, honoring the override
    pub fn gateway_url(&self) -> &str {
        self.gateway_url
            .as_deref()
            .unwrap_or_else(|| self.network.default_gateway_url())
    }
}

/// A wallet account
///
/// Secret material is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Public identifier ("G..." strkey), immutable
    pub public_key: String,

    /// User-facing label
    pub name: String,

    /// Cached native balance, two decimals
    #[serde(default = "default_balance")]
    pub balance: String,
}

fn default_balance() -> String {
    ZERO_BALANCE.to_string()
}

impl Account {
    /// Create an account with a zero balance
    pub fn new(public_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            name: name.into(),
            balance: default_balance(),
        }
    }

    /// Default name for the account at `position` (zero-based)
    pub fn default_name(position: usize) -> String {
        format!("Account {}", position + 1)
    }
}

/// Persisted wallet state (without secret keys)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    /// Accounts in creation order
    pub accounts: Vec<Account>,

    /// Index into `accounts`; meaningless when `accounts` is empty
    #[serde(default)]
    pub active_account_index: usize,

    #[serde(default)]
    pub network: Network,
}

impl WalletSnapshot {
    /// Empty wallet on the given network
    pub fn empty(network: Network) -> Self {
        Self {
            accounts: Vec::new(),
            active_account_index: 0,
            network,
        }
    }

    /// Active account index, `None` when the wallet has no accounts
    pub fn active_index(&self) -> Option<usize> {
        (!self.accounts.is_empty()).then_some(self.active_account_index)
    }

    /// Check `0 <= active < len` for a non-empty wallet
    pub fn index_in_bounds(&self) -> bool {
        self.accounts.is_empty() || self.active_account_index < self.accounts.len()
    }
}

/// A user-specified, not-yet-validated payment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub destination: String,

    /// Decimal amount string
    pub amount: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_issuer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl PaymentIntent {
    /// Native-asset payment
    pub fn native(destination: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            amount: amount.into(),
            ..Default::default()
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_asset(mut self, code: impl Into<String>, issuer: impl Into<String>) -> Self {
        self.asset_code = Some(code.into());
        self.asset_issuer = Some(issuer.into());
        self
    }
}

/// Outcome of a submitted payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub hash: String,
    pub ledger: u64,
    pub success: bool,
}
