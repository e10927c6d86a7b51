//! Secret sealing capability
//!
//! Secret material is passed through a [`SecretCipher`] before it reaches
//! the store. No encryption scheme is built in; deployments plug one in.

use crate::error::Result;

/// Seals and opens per-account secret material
pub trait SecretCipher: Send + Sync {
    /// Short identifier, logged at startup
    fn name(&self) -> &'static str;

    /// Transform a secret into its stored form
    fn seal(&self, public_key: &str, secret: &str) -> Result<String>;

    /// Recover a secret from its stored form
    fn open(&self, public_key: &str, sealed: &str) -> Result<String>;
}

/// Identity cipher: stores secrets as-is
///
/// Intended for tests and explicit opt-in only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl SecretCipher for PlaintextCipher {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    fn seal(&self, _public_key: &str, secret: &str) -> Result<String> {
        Ok(secret.to_string())
    }

    fn open(&self, _public_key: &str, sealed: &str) -> Result<String> {
        Ok(sealed.to_string())
    }
}
