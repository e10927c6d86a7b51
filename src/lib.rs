//! Qastra Wallet Library
//!
//! Multi-account Stellar wallet core: session state, persistence, payment
//! validation and QR payment requests.

pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod scan;
pub mod session;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use session::{SessionController, SessionState};
