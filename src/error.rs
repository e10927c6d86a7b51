//! Error types for the wallet core

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet core
#[derive(Error, Debug)]
pub enum Error {
    // Account registry errors
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Active account index {index} out of range for {count} accounts")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("No active account")]
    NoActiveAccount,

    #[error("Invalid account name: {0}")]
    InvalidName(String),

    // Persistence errors
    #[error("Stored wallet state is corrupt: {0}")]
    CorruptState(String),

    #[error("Secret key not found for account {0}")]
    SecretUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // Payment intent validation errors
    #[error("Invalid destination address: {0}")]
    InvalidDestination(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Asset code and asset issuer must be provided together")]
    AssetPairingError,

    #[error("Unrecognized payment QR format: {0}")]
    UnrecognizedFormat(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecret(String),

    // Ledger errors
    #[error("{0}")]
    TransactionFailed(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Account funding unavailable: {0}")]
    FundingUnavailable(String),

    // Session errors
    #[error("Session not initialized")]
    NotInitialized,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error was raised by input validation, before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidDestination(_)
                | Error::InvalidAmount(_)
                | Error::AssetPairingError
                | Error::UnrecognizedFormat(_)
                | Error::InvalidSecret(_)
                | Error::InvalidName(_)
        )
    }

    /// Check if this error is retryable (transient gateway failure)
    ///
    /// Payment submission failures are never retryable here; the user
    /// resubmits explicitly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Ledger(_) | Error::Io(_))
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Ledger(e.to_string())
    }
}
