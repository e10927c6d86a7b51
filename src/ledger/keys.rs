//! Key encoding
//!
//! Ed25519 keys in strkey form: "G..." account ids and "S..." seeds.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use stellar_strkey::ed25519::{PrivateKey, PublicKey};

use crate::error::{Error, Result};

use super::Keypair;

/// Generate a random keypair
pub fn generate() -> Keypair {
    let signing_key = SigningKey::generate(&mut OsRng);
    keypair_from_signing_key(&signing_key)
}

/// Decode a "S..." seed into a signing key
pub fn signing_key_from_secret(secret_key: &str) -> Result<SigningKey> {
    let seed = PrivateKey::from_string(secret_key.trim())
        .map_err(|e| Error::InvalidSecret(format!("{:?}", e)))?;
    Ok(SigningKey::from_bytes(&seed.0))
}

/// Derive the full keypair for a "S..." seed
pub fn keypair_from_secret(secret_key: &str) -> Result<Keypair> {
    let signing_key = signing_key_from_secret(secret_key)?;
    Ok(keypair_from_signing_key(&signing_key))
}

pub fn keypair_from_signing_key(signing_key: &SigningKey) -> Keypair {
    Keypair {
        public_key: encode_public_key(signing_key.verifying_key().to_bytes()),
        secret_key: PrivateKey(signing_key.to_bytes()).to_string(),
    }
}

/// Decode a "G..." account id into raw key bytes
pub fn decode_public_key(public_key: &str) -> Result<[u8; 32]> {
    PublicKey::from_string(public_key)
        .map(|pk| pk.0)
        .map_err(|e| Error::InvalidDestination(format!("{}: {:?}", public_key, e)))
}

pub fn encode_public_key(bytes: [u8; 32]) -> String {
    PublicKey(bytes).to_string()
}
