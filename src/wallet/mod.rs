//! Wallet domain module
//!
//! Accounts, the persisted snapshot, and payment intent validation:
//! - Account registry (ordered, unique public keys)
//! - Persistence (snapshot + per-account secrets over a key-value store)
//! - Intent validation (runs before any network call)
//!
//! # Architecture
//!
//! ```text
//! SessionController → AccountRegistry
//!                   → WalletPersistence → KeyValueStore
//!                   → validator::validate
//! ```
//!
//! # Security
//!
//! Secret keys are never part of [`WalletSnapshot`]; they are stored under
//! `secret_prefix + public_key` after passing through the configured
//! [`SecretCipher`](crate::storage::SecretCipher).

pub mod amount;
pub mod persistence;
pub mod registry;
pub mod types;
pub mod validator;

pub use persistence::{StorageKeys, WalletPersistence};
pub use registry::AccountRegistry;
pub use types::{
    Account, Network, NetworkConfig, PaymentIntent, TransactionResult, WalletSnapshot,
    ZERO_BALANCE,
};
