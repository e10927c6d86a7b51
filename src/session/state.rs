//! Observable session state

use serde::{Deserialize, Serialize};

use crate::wallet::{Account, Network, TransactionResult};

/// How a payment ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOutcome {
    Success(TransactionResult),

    /// Error message, verbatim
    Failure(String),
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionOutcome::Success(_))
    }
}

/// Controller lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Ready,
    Refreshing,
    Sending,
    TransactionPending,
    TransactionSettled(TransactionOutcome),
}

impl SessionPhase {
    /// A payment is between validation and settlement
    pub fn is_sending(&self) -> bool {
        matches!(self, SessionPhase::Sending | SessionPhase::TransactionPending)
    }
}

/// Provenance of the balances in [`SessionState::accounts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceStatus {
    /// Stale; a fetch for the current network is in flight
    Loading,

    /// Restored from storage, not fetched this session
    Cached { network: Network },

    /// Fetched from the ledger for `network`
    Settled { network: Network },
}

/// Snapshot of everything a UI renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub network: Network,
    pub accounts: Vec<Account>,

    /// `None` when there are no accounts
    pub active_index: Option<usize>,

    pub balances: BalanceStatus,

    /// Most recent payment outcome this session
    pub last_transaction: Option<TransactionOutcome>,
}

impl SessionState {
    pub fn uninitialized(network: Network) -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            network,
            accounts: Vec::new(),
            active_index: None,
            balances: BalanceStatus::Loading,
            last_transaction: None,
        }
    }

    pub fn active_account(&self) -> Option<&Account> {
        self.active_index.and_then(|i| self.accounts.get(i))
    }

    /// True when balances are known for the current network
    pub fn balances_current(&self) -> bool {
        match self.balances {
            BalanceStatus::Loading => false,
            BalanceStatus::Cached { network } | BalanceStatus::Settled { network } => {
                network == self.network
            }
        }
    }

    /// Balance of the account at `index`, hidden while loading
    pub fn balance_of(&self, index: usize) -> Option<&str> {
        if !self.balances_current() {
            return None;
        }
        self.accounts.get(index).map(|a| a.balance.as_str())
    }
}
