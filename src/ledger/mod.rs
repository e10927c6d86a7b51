//! Ledger access
//!
//! [`LedgerClient`] is the capability the session needs from the ledger:
//! keys, account lookups, payments, testnet funding and history. A
//! [`LedgerConnector`] builds one client per network.
//!
//! The shipped implementation talks to a Horizon gateway
//! ([`horizon::HorizonClient`]).

pub mod envelope;
pub mod horizon;
pub mod keys;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::wallet::{Network, NetworkConfig, PaymentIntent, TransactionResult};

pub use horizon::{HorizonClient, HorizonConnector};

/// Base fee per operation in stroops
pub const BASE_FEE_STROOPS: u32 = 100;

/// Base fee rendered in native units
pub const BASE_FEE: &str = "0.00001";

/// Public/secret key pair, strkey encoded
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    /// "G..." account id
    pub public_key: String,

    /// "S..." seed
    pub secret_key: String,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// One balance line of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceLine {
    /// "native", "credit_alphanum4", ...
    pub asset_type: String,

    #[serde(default)]
    pub asset_code: Option<String>,

    #[serde(default)]
    pub asset_issuer: Option<String>,

    pub balance: String,
}

/// Account state as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetails {
    #[serde(rename = "account_id")]
    pub public_key: String,

    pub balances: Vec<BalanceLine>,

    /// Current sequence number (decimal string)
    pub sequence: String,
}

impl AccountDetails {
    /// Balance of the native asset, if the account holds one
    pub fn native_balance(&self) -> Option<&str> {
        self.balances
            .iter()
            .find(|b| b.asset_type == "native")
            .map(|b| b.balance.as_str())
    }
}

/// A transaction from an account's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub ledger: u64,
    pub created_at: DateTime<Utc>,
    pub source_account: String,

    /// Fee charged in stroops
    #[serde(deserialize_with = "string_or_number")]
    pub fee_charged: String,

    pub operation_count: u32,

    #[serde(default)]
    pub memo: Option<String>,

    pub successful: bool,
}

/// Horizon encodes some integers as strings, older versions as numbers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Ledger capability for one network
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Network this client signs and queries for
    fn network(&self) -> Network;

    /// Create a fresh random keypair
    fn generate_keypair(&self) -> Result<Keypair>;

    /// Derive the keypair for a secret seed
    fn import_from_secret(&self, secret_key: &str) -> Result<Keypair>;

    /// Fetch balances and sequence; fails for unfunded accounts
    async fn fetch_account_details(&self, public_key: &str) -> Result<AccountDetails>;

    /// Build, sign and submit a payment
    async fn submit_payment(
        &self,
        secret_key: &str,
        intent: &PaymentIntent,
    ) -> Result<TransactionResult>;

    /// Ask the testnet faucet to fund an account
    async fn request_testnet_funding(&self, public_key: &str) -> Result<()>;

    /// Most recent transactions first
    async fn fetch_transaction_history(
        &self,
        public_key: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>>;
}

/// Builds ledger clients per network
pub trait LedgerConnector: Send + Sync {
    fn connect(&self, config: &NetworkConfig) -> Result<Arc<dyn LedgerClient>>;
}
