//! Wallet session
//!
//! [`SessionController`] drives every user-facing operation and publishes a
//! [`SessionState`] after each transition:
//!
//! ```text
//! Uninitialized → Loading → Ready ⇄ Refreshing
//!                           Ready → Sending → TransactionPending → TransactionSettled
//! ```

pub mod controller;
pub mod state;

pub use controller::{CreatedAccount, PaymentReceipt, SessionController, SessionSettings};
pub use state::{BalanceStatus, SessionPhase, SessionState, TransactionOutcome};
