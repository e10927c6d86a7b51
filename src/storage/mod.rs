//! Key-value storage backends
//!
//! The wallet persists everything through [`KeyValueStore`], a string-keyed
//! async store shaped like browser extension local storage.
//!
//! ```text
//! WalletPersistence → SecretCipher (secrets only) → KeyValueStore
//!                                                   ├─ MemoryStore
//!                                                   └─ JsonFileStore
//! ```

pub mod cipher;
pub mod file;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use cipher::{PlaintextCipher, SecretCipher};
pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Async string key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never set
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// Erase every key
    async fn clear(&self) -> Result<()>;
}
