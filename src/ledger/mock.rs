//! Scriptable in-process ledger for controller tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::wallet::{Network, NetworkConfig, PaymentIntent, TransactionResult};

use super::{AccountDetails, BalanceLine, Keypair, LedgerClient, LedgerConnector, TransactionRecord};

/// Shared script for every client the connector hands out
pub struct MockLedgerState {
    balances: Mutex<HashMap<(Network, String), String>>,
    failing: Mutex<HashSet<String>>,
    submit_error: Mutex<Option<String>>,
    funding_error: Mutex<Option<String>>,
    funded: Mutex<Vec<(Network, String)>>,
    history: Mutex<Vec<TransactionRecord>>,
    next_key: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl MockLedgerState {
    fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            balances: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            submit_error: Mutex::new(None),
            funding_error: Mutex::new(None),
            funded: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            next_key: AtomicUsize::new(1),
            submit_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            gate,
        }
    }

    pub fn set_balance(&self, network: Network, public_key: &str, balance: &str) {
        self.balances
            .lock()
            .unwrap()
            .insert((network, public_key.to_string()), balance.to_string());
    }

    /// Make every fetch for `public_key` fail
    pub fn fail_fetch(&self, public_key: &str) {
        self.failing.lock().unwrap().insert(public_key.to_string());
    }

    pub fn fail_submit(&self, message: &str) {
        *self.submit_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_funding(&self, message: &str) {
        *self.funding_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn funded(&self) -> Vec<(Network, String)> {
        self.funded.lock().unwrap().clone()
    }

    pub fn push_history(&self, record: TransactionRecord) {
        self.history.lock().unwrap().push(record);
    }

    /// Hold account fetches until [`open_gate`](Self::open_gate)
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

/// Deterministic 56-character keys: "S000..0n" seeds and "G000..0n" ids
pub fn secret_for(n: usize) -> String {
    format!("S{:0>55}", n)
}

pub fn public_for(n: usize) -> String {
    format!("G{:0>55}", n)
}

pub struct MockLedger {
    network: Network,
    state: Arc<MockLedgerState>,
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn network(&self) -> Network {
        self.network
    }

    fn generate_keypair(&self) -> Result<Keypair> {
        let n = self.state.next_key.fetch_add(1, Ordering::SeqCst);
        Ok(Keypair {
            public_key: public_for(n),
            secret_key: secret_for(n),
        })
    }

    fn import_from_secret(&self, secret_key: &str) -> Result<Keypair> {
        if secret_key.len() != 56 || !secret_key.starts_with('S') {
            return Err(Error::InvalidSecret("not a seed".to_string()));
        }
        Ok(Keypair {
            public_key: format!("G{}", &secret_key[1..]),
            secret_key: secret_key.to_string(),
        })
    }

    async fn fetch_account_details(&self, public_key: &str) -> Result<AccountDetails> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.state.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if self.state.failing.lock().unwrap().contains(public_key) {
            return Err(Error::Ledger(format!("Resource not found: {}", public_key)));
        }

        let balance = self
            .state
            .balances
            .lock()
            .unwrap()
            .get(&(self.network, public_key.to_string()))
            .cloned()
            .ok_or_else(|| Error::Ledger(format!("Resource not found: {}", public_key)))?;

        Ok(AccountDetails {
            public_key: public_key.to_string(),
            balances: vec![BalanceLine {
                asset_type: "native".to_string(),
                asset_code: None,
                asset_issuer: None,
                balance,
            }],
            sequence: "1".to_string(),
        })
    }

    async fn submit_payment(
        &self,
        _secret_key: &str,
        intent: &PaymentIntent,
    ) -> Result<TransactionResult> {
        let n = self.state.submit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.state.submit_error.lock().unwrap().clone() {
            return Err(Error::TransactionFailed(message));
        }

        Ok(TransactionResult {
            hash: format!("tx{}-{}", n, intent.amount),
            ledger: 1000 + n as u64,
            success: true,
        })
    }

    async fn request_testnet_funding(&self, public_key: &str) -> Result<()> {
        if self.network != Network::Testnet {
            return Err(Error::FundingUnavailable("public network".to_string()));
        }
        if let Some(message) = self.state.funding_error.lock().unwrap().clone() {
            return Err(Error::Ledger(message));
        }

        self.state
            .funded
            .lock()
            .unwrap()
            .push((self.network, public_key.to_string()));
        self.set_funded_balance(public_key);
        Ok(())
    }

    async fn fetch_transaction_history(
        &self,
        public_key: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .state
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.source_account == public_key)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl MockLedger {
    fn set_funded_balance(&self, public_key: &str) {
        self.state
            .set_balance(self.network, public_key, "10000.0000000");
    }
}

/// Hands out [`MockLedger`] clients sharing one script
pub struct MockConnector {
    pub state: Arc<MockLedgerState>,
    pub connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(MockLedgerState::new()),
            connects: AtomicUsize::new(0),
        })
    }
}

impl LedgerConnector for MockConnector {
    fn connect(&self, config: &NetworkConfig) -> Result<Arc<dyn LedgerClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockLedger {
            network: config.network,
            state: self.state.clone(),
        }))
    }
}
