//! Session controller
//!
//! Owns the network selection, the account registry and the active index,
//! and keeps them in step with storage and the ledger. Every mutation is
//! persisted before the call returns; a failed write restores the previous
//! in-memory state.
//!
//! The core state sits behind one async mutex. It is held while applying
//! results and persisting, never while waiting on the ledger.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::ledger::{LedgerClient, LedgerConnector, TransactionRecord, BASE_FEE};
use crate::wallet::amount::format_balance;
use crate::wallet::{
    validator, Account, AccountRegistry, Network, NetworkConfig, PaymentIntent,
    TransactionResult, WalletPersistence, WalletSnapshot, ZERO_BALANCE,
};

use super::state::{BalanceStatus, SessionPhase, SessionState, TransactionOutcome};

/// Controller settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Network for a wallet with no saved state
    pub default_network: Network,

    pub public_gateway_url: Option<String>,
    pub testnet_gateway_url: Option<String>,

    /// Delay before the balance refresh that follows a payment
    pub refresh_after_payment: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_network: Network::Testnet,
            public_gateway_url: None,
            testnet_gateway_url: None,
            refresh_after_payment: Duration::from_millis(2000),
        }
    }
}

impl SessionSettings {
    pub fn network_config(&self, network: Network) -> NetworkConfig {
        let gateway = match network {
            Network::Public => self.public_gateway_url.clone(),
            Network::Testnet => self.testnet_gateway_url.clone(),
        };
        NetworkConfig::with_gateway(network, gateway)
    }
}

/// Result of [`SessionController::create_account`]
#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub account: Account,

    /// Set when testnet funding failed; the account itself was saved
    pub funding_warning: Option<String>,
}

/// Result of a successful [`SessionController::send_payment`]
#[derive(Debug)]
pub struct PaymentReceipt {
    pub result: TransactionResult,

    /// Scheduled balance refresh
    pub refresh: JoinHandle<SessionState>,
}

struct Core {
    initialized: bool,
    phase: SessionPhase,
    network: Network,
    registry: AccountRegistry,
    active_index: usize,
    balances: BalanceStatus,
    last_transaction: Option<TransactionOutcome>,

    /// Bumped on reload/reset so in-flight refreshes can tell they are stale
    epoch: u64,
}

/// Persisted fields, for rollback
struct Checkpoint {
    registry: AccountRegistry,
    active_index: usize,
    network: Network,
}

impl Core {
    fn new(network: Network) -> Self {
        Self {
            initialized: false,
            phase: SessionPhase::Uninitialized,
            network,
            registry: AccountRegistry::new(),
            active_index: 0,
            balances: BalanceStatus::Loading,
            last_transaction: None,
            epoch: 0,
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn snapshot(&self) -> WalletSnapshot {
        WalletSnapshot {
            accounts: self.registry.list(),
            active_account_index: self.active_index,
            network: self.network,
        }
    }

    fn state(&self) -> SessionState {
        SessionState {
            phase: self.phase.clone(),
            network: self.network,
            accounts: self.registry.list(),
            active_index: (!self.registry.is_empty()).then_some(self.active_index),
            balances: self.balances,
            last_transaction: self.last_transaction.clone(),
        }
    }

    fn active_account(&self) -> Option<&Account> {
        self.registry.get_index(self.active_index)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            registry: self.registry.clone(),
            active_index: self.active_index,
            network: self.network,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.registry = checkpoint.registry;
        self.active_index = checkpoint.active_index;
        self.network = checkpoint.network;
    }

    /// `active < len` for a non-empty wallet
    fn check_index(&self) -> Result<()> {
        let count = self.registry.len();
        if count > 0 && self.active_index >= count {
            return Err(Error::IndexOutOfRange {
                index: self.active_index,
                count,
            });
        }
        Ok(())
    }
}

/// Active index after removing the entry at `removed`
fn retarget(active: usize, removed: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else if active > removed {
        active - 1
    } else {
        active.min(len - 1)
    }
}

/// Native balance of one account; any failure reads as zero
async fn fetch_balance(client: &dyn LedgerClient, public_key: &str) -> String {
    match client.fetch_account_details(public_key).await {
        Ok(details) => details
            .native_balance()
            .map(format_balance)
            .unwrap_or_else(|| ZERO_BALANCE.to_string()),
        Err(e) => {
            warn!("Balance unavailable for {} (unfunded?): {}", public_key, e);
            ZERO_BALANCE.to_string()
        }
    }
}

struct Inner {
    persistence: WalletPersistence,
    connector: Arc<dyn LedgerConnector>,
    settings: SessionSettings,
    core: Mutex<Core>,
    state_tx: watch::Sender<SessionState>,
}

/// Orchestrates accounts, storage and the ledger
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        persistence: WalletPersistence,
        connector: Arc<dyn LedgerConnector>,
        settings: SessionSettings,
    ) -> Self {
        let network = settings.default_network;
        let (state_tx, _) = watch::channel(SessionState::uninitialized(network));

        Self {
            inner: Arc::new(Inner {
                persistence,
                connector,
                settings,
                core: Mutex::new(Core::new(network)),
                state_tx,
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receive a new [`SessionState`] after every transition
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn active_account(&self) -> Option<Account> {
        self.state().active_account().cloned()
    }

    /// Base fee per operation, in native units
    pub fn estimate_fee(&self) -> &'static str {
        BASE_FEE
    }

    fn publish(&self, core: &Core) {
        self.inner.state_tx.send_replace(core.state());
    }

    fn ledger(&self, network: Network) -> Result<Arc<dyn LedgerClient>> {
        self.inner
            .connector
            .connect(&self.inner.settings.network_config(network))
    }

    /// Validate and persist a mutation, rolling back on failure
    async fn commit(&self, core: &mut Core, checkpoint: Checkpoint) -> Result<()> {
        let saved = match core.check_index() {
            Ok(()) => self.inner.persistence.save(&core.snapshot()).await,
            Err(e) => Err(e),
        };

        if let Err(e) = saved {
            warn!("Rolling back wallet change: {}", e);
            core.restore(checkpoint);
            return Err(e);
        }

        self.publish(core);
        Ok(())
    }

    /// Load saved state; no balances are fetched
    pub async fn initialize(&self) -> Result<SessionState> {
        let mut core = self.inner.core.lock().await;
        core.phase = SessionPhase::Loading;
        self.publish(&core);

        let loaded = self
            .inner
            .persistence
            .load()
            .await
            .and_then(|snapshot| match snapshot {
                Some(s) => {
                    let registry = AccountRegistry::from_accounts(s.accounts)
                        .map_err(|e| Error::CorruptState(e.to_string()))?;
                    Ok(Some((registry, s.active_account_index, s.network)))
                }
                None => Ok(None),
            });

        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("Failed to load wallet: {}", e);
                core.initialized = false;
                core.phase = SessionPhase::Uninitialized;
                self.publish(&core);
                return Err(e);
            }
        };

        match loaded {
            Some((registry, active_index, network)) => {
                info!(
                    "Restored {} accounts on {} (active #{})",
                    registry.len(),
                    network,
                    active_index
                );
                core.registry = registry;
                core.active_index = active_index;
                core.network = network;
                core.balances = BalanceStatus::Cached { network };
            }
            None => {
                let network = self.inner.settings.default_network;
                info!("No saved wallet, starting empty on {}", network);
                core.registry = AccountRegistry::new();
                core.active_index = 0;
                core.network = network;
                core.balances = BalanceStatus::Settled { network };
            }
        }

        core.initialized = true;
        core.epoch += 1;
        core.last_transaction = None;
        core.phase = SessionPhase::Ready;
        self.publish(&core);
        Ok(core.state())
    }

    /// Append an account and persist its secret, then the snapshot
    async fn store_new_account(
        &self,
        core: &mut Core,
        account: Account,
        secret_key: &str,
        make_active: bool,
    ) -> Result<()> {
        let checkpoint = core.checkpoint();
        core.registry.add(account.clone())?;
        if make_active || checkpoint.registry.is_empty() {
            core.active_index = core.registry.len() - 1;
        }

        if let Err(e) = self
            .inner
            .persistence
            .save_secret(&account.public_key, secret_key)
            .await
        {
            core.restore(checkpoint);
            return Err(e);
        }

        if let Err(e) = self.commit(core, checkpoint).await {
            if let Err(cleanup) = self.inner.persistence.remove_secret(&account.public_key).await {
                warn!(
                    "Orphaned secret for {} left in storage: {}",
                    account.public_key, cleanup
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Create a fresh account; on testnet it is also funded
    pub async fn create_account(&self, is_first: bool) -> Result<CreatedAccount> {
        let (client, account) = {
            let mut core = self.inner.core.lock().await;
            core.ensure_ready()?;

            let client = self.ledger(core.network)?;
            let keypair = client.generate_keypair()?;
            let account = Account::new(
                keypair.public_key.clone(),
                Account::default_name(core.registry.len()),
            );

            self.store_new_account(&mut core, account.clone(), &keypair.secret_key, is_first)
                .await?;
            info!("Created {} ({})", account.name, account.public_key);
            (client, account)
        };

        if client.network() != Network::Testnet {
            return Ok(CreatedAccount {
                account,
                funding_warning: None,
            });
        }

        let funding = {
            let client = client.clone();
            let public_key = account.public_key.clone();
            tokio::spawn(async move { client.request_testnet_funding(&public_key).await })
        };

        let funding_warning = match funding.await {
            Ok(Ok(())) => {
                info!("Funded {} on testnet", account.public_key);
                None
            }
            Ok(Err(e)) => {
                warn!("Funding {} failed: {}", account.public_key, e);
                Some(e.to_string())
            }
            Err(e) => {
                warn!("Funding task for {} failed: {}", account.public_key, e);
                Some(format!("Funding task failed: {}", e))
            }
        };

        Ok(CreatedAccount {
            account,
            funding_warning,
        })
    }

    /// Add an account from its secret seed
    pub async fn import_account(&self, secret_key: &str) -> Result<Account> {
        let mut core = self.inner.core.lock().await;
        core.ensure_ready()?;

        let keypair = self.ledger(core.network)?.import_from_secret(secret_key)?;
        if core.registry.contains(&keypair.public_key) {
            return Err(Error::DuplicateAccount(keypair.public_key));
        }

        let account = Account::new(
            keypair.public_key.clone(),
            Account::default_name(core.registry.len()),
        );
        self.store_new_account(&mut core, account.clone(), &keypair.secret_key, false)
            .await?;

        info!("Imported {} ({})", account.name, account.public_key);
        Ok(account)
    }

    /// Re-fetch every balance on the current network
    ///
    /// Never fails: unreachable or unfunded accounts read as zero and a
    /// failed write is logged.
    pub async fn refresh_balances(&self) -> SessionState {
        match self.refresh().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Balances refreshed but not saved: {}", e);
                self.state()
            }
        }
    }

    async fn refresh(&self) -> Result<SessionState> {
        let (network, epoch, keys) = {
            let mut core = self.inner.core.lock().await;
            if !core.initialized {
                return Ok(core.state());
            }
            if !core.phase.is_sending() {
                core.phase = SessionPhase::Refreshing;
            }
            self.publish(&core);

            let keys: Vec<String> = core
                .registry
                .list()
                .into_iter()
                .map(|a| a.public_key)
                .collect();
            (core.network, core.epoch, keys)
        };

        debug!("Fetching {} balances on {}", keys.len(), network);
        let balances = match self.ledger(network) {
            Ok(client) => {
                join_all(keys.iter().map(|pk| fetch_balance(client.as_ref(), pk))).await
            }
            Err(e) => {
                warn!("No ledger client for {}: {}", network, e);
                vec![ZERO_BALANCE.to_string(); keys.len()]
            }
        };

        let mut core = self.inner.core.lock().await;
        if core.network != network || core.epoch != epoch {
            debug!("Discarding {} balances fetched before a switch", network);
            return Ok(core.state());
        }

        for (public_key, balance) in keys.iter().zip(balances) {
            if core.registry.update_balance(public_key, &balance).is_err() {
                debug!("{} was removed during refresh", public_key);
            }
        }

        core.balances = BalanceStatus::Settled { network };
        if core.phase == SessionPhase::Refreshing {
            core.phase = SessionPhase::Ready;
        }

        let saved = self.inner.persistence.save(&core.snapshot()).await;
        self.publish(&core);
        info!("Refreshed {} balances on {}", keys.len(), network);
        saved.map(|_| core.state())
    }

    /// Toggle PUBLIC/TESTNET and refresh under the new network
    pub async fn switch_network(&self) -> Result<SessionState> {
        let (previous, previous_status, previous_balances) = {
            let mut core = self.inner.core.lock().await;
            core.ensure_ready()?;

            let previous = core.network;
            let previous_status = core.balances;
            let previous_balances: Vec<(String, String)> = core
                .registry
                .list()
                .into_iter()
                .map(|a| (a.public_key, a.balance))
                .collect();

            core.network = previous.toggled();
            core.balances = BalanceStatus::Loading;
            core.phase = SessionPhase::Refreshing;
            self.publish(&core);
            info!("Switching network {} -> {}", previous, core.network);
            (previous, previous_status, previous_balances)
        };

        match self.refresh().await {
            Ok(state) => Ok(state),
            Err(e) => {
                let mut core = self.inner.core.lock().await;
                if core.network == previous.toggled() {
                    warn!("Network switch not saved, staying on {}: {}", previous, e);
                    core.network = previous;

                    // Balances fetched on the other network must not be kept
                    for (public_key, balance) in &previous_balances {
                        let _ = core.registry.update_balance(public_key, balance);
                    }
                    core.balances = match previous_status {
                        BalanceStatus::Loading => BalanceStatus::Loading,
                        BalanceStatus::Cached { network } | BalanceStatus::Settled { network } => {
                            BalanceStatus::Cached { network }
                        }
                    };
                    core.phase = SessionPhase::Ready;
                    self.publish(&core);
                }
                Err(e)
            }
        }
    }

    async fn set_phase(&self, phase: SessionPhase) {
        let mut core = self.inner.core.lock().await;
        core.phase = phase;
        self.publish(&core);
    }

    async fn settle(&self, outcome: TransactionOutcome) {
        let mut core = self.inner.core.lock().await;
        core.last_transaction = Some(outcome.clone());
        core.phase = SessionPhase::TransactionSettled(outcome);
        self.publish(&core);
    }

    async fn settle_failure(&self, err: Error) -> Error {
        error!("Payment failed: {}", err);
        self.settle(TransactionOutcome::Failure(err.to_string())).await;
        err
    }

    /// Validate, sign and submit a payment from `from`
    ///
    /// Concurrent sends are not queued; callers must wait for settlement.
    pub async fn send_payment(&self, from: &str, intent: PaymentIntent) -> Result<PaymentReceipt> {
        validator::validate(&intent)?;

        let network = {
            let mut core = self.inner.core.lock().await;
            core.ensure_ready()?;
            if !core.registry.contains(from) {
                return Err(Error::NotFound(from.to_string()));
            }
            core.phase = SessionPhase::Sending;
            self.publish(&core);
            core.network
        };

        let secret = match self.inner.persistence.load_secret(from).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                return Err(self
                    .settle_failure(Error::SecretUnavailable(from.to_string()))
                    .await)
            }
            Err(e) => return Err(self.settle_failure(e).await),
        };

        let client = match self.ledger(network) {
            Ok(client) => client,
            Err(e) => return Err(self.settle_failure(e).await),
        };

        self.set_phase(SessionPhase::TransactionPending).await;
        info!(
            "Sending {} {} from {} to {}",
            intent.amount,
            intent.asset_code.as_deref().unwrap_or("XLM"),
            from,
            intent.destination
        );

        match client.submit_payment(&secret, &intent).await {
            Ok(result) => {
                self.settle(TransactionOutcome::Success(result.clone())).await;
                info!("Payment settled: {} (ledger {})", result.hash, result.ledger);

                let controller = self.clone();
                let delay = self.inner.settings.refresh_after_payment;
                let refresh = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    controller.refresh_balances().await
                });

                Ok(PaymentReceipt { result, refresh })
            }
            Err(e) => {
                let message = match e {
                    Error::TransactionFailed(message) => message,
                    other => other.to_string(),
                };
                Err(self.settle_failure(Error::TransactionFailed(message)).await)
            }
        }
    }

    /// Select the active account by position
    pub async fn set_active_account(&self, index: usize) -> Result<()> {
        let mut core = self.inner.core.lock().await;
        core.ensure_ready()?;

        let count = core.registry.len();
        if index >= count {
            return Err(Error::IndexOutOfRange { index, count });
        }

        let checkpoint = core.checkpoint();
        core.active_index = index;
        self.commit(&mut core, checkpoint).await?;
        info!("Active account is now #{}", index);
        Ok(())
    }

    pub async fn rename_account(&self, public_key: &str, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidName("name cannot be empty".to_string()));
        }

        let mut core = self.inner.core.lock().await;
        core.ensure_ready()?;

        let checkpoint = core.checkpoint();
        core.registry.rename(public_key, name)?;
        self.commit(&mut core, checkpoint).await
    }

    /// Remove an account and its secret
    pub async fn remove_account(&self, public_key: &str) -> Result<Account> {
        let mut core = self.inner.core.lock().await;
        core.ensure_ready()?;

        let account = core
            .registry
            .get(public_key)
            .cloned()
            .ok_or_else(|| Error::NotFound(public_key.to_string()))?;

        let checkpoint = core.checkpoint();
        let position = core.registry.remove(public_key)?;
        core.active_index = retarget(core.active_index, position, core.registry.len());
        self.commit(&mut core, checkpoint).await?;

        if let Err(e) = self.inner.persistence.remove_secret(public_key).await {
            warn!("Secret for removed account {} not deleted: {}", public_key, e);
        }

        info!("Removed {} ({})", account.name, public_key);
        Ok(account)
    }

    /// Ask the testnet faucet to fund the active account, then refresh
    pub async fn fund_active_account(&self) -> Result<SessionState> {
        let (network, public_key) = {
            let core = self.inner.core.lock().await;
            core.ensure_ready()?;
            let account = core.active_account().ok_or(Error::NoActiveAccount)?;
            (core.network, account.public_key.clone())
        };

        if network != Network::Testnet {
            return Err(Error::FundingUnavailable(format!(
                "funding is only available on {}",
                Network::Testnet
            )));
        }

        self.ledger(network)?
            .request_testnet_funding(&public_key)
            .await?;
        info!("Funded {}", public_key);
        Ok(self.refresh_balances().await)
    }

    /// Recent transactions, newest first; defaults to the active account
    pub async fn transaction_history(
        &self,
        public_key: Option<&str>,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>> {
        let (network, public_key) = {
            let core = self.inner.core.lock().await;
            core.ensure_ready()?;

            let public_key = match public_key {
                Some(pk) if core.registry.contains(pk) => pk.to_string(),
                Some(pk) => return Err(Error::NotFound(pk.to_string())),
                None => core
                    .active_account()
                    .map(|a| a.public_key.clone())
                    .ok_or(Error::NoActiveAccount)?,
            };
            (core.network, public_key)
        };

        self.ledger(network)?
            .fetch_transaction_history(&public_key, limit)
            .await
    }

    /// Erase every account and secret
    pub async fn reset_wallet(&self) -> Result<SessionState> {
        let mut core = self.inner.core.lock().await;
        self.inner.persistence.clear_all().await?;

        let network = self.inner.settings.default_network;
        let epoch = core.epoch + 1;
        *core = Core {
            initialized: true,
            phase: SessionPhase::Ready,
            network,
            registry: AccountRegistry::new(),
            active_index: 0,
            balances: BalanceStatus::Settled { network },
            last_transaction: None,
            epoch,
        };

        warn!("Wallet reset");
        self.publish(&core);
        Ok(core.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::mock::{public_for, secret_for, MockConnector};
    use crate::storage::{KeyValueStore, MemoryStore, PlaintextCipher};
    use crate::wallet::StorageKeys;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be made to fail
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Storage("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }

        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }
    }

    struct Harness {
        controller: SessionController,
        ledger: Arc<MockConnector>,
        store: Arc<FlakyStore>,
        persistence: WalletPersistence,
    }

    fn harness_on(network: Network) -> Harness {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_writes: AtomicBool::new(false),
        });
        let persistence =
            WalletPersistence::new(store.clone(), Arc::new(PlaintextCipher), StorageKeys::default());
        let ledger = MockConnector::new();
        let settings = SessionSettings {
            default_network: network,
            refresh_after_payment: Duration::from_millis(10),
            ..Default::default()
        };
        let controller = SessionController::new(persistence.clone(), ledger.clone(), settings);

        Harness {
            controller,
            ledger,
            store,
            persistence,
        }
    }

    /// Wallet with `count` saved accounts (keys 100, 101, ...) on `network`
    async fn seeded(count: usize, network: Network) -> Harness {
        let h = harness_on(network);
        let mut accounts = Vec::new();
        for i in 0..count {
            let mut account = Account::new(public_for(100 + i), Account::default_name(i));
            account.balance = "55.00".to_string();
            h.persistence
                .save_secret(&account.public_key, &secret_for(100 + i))
                .await
                .unwrap();
            accounts.push(account);
        }
        h.persistence
            .save(&WalletSnapshot {
                accounts,
                active_account_index: 0,
                network,
            })
            .await
            .unwrap();
        h.controller.initialize().await.unwrap();
        h
    }

    fn balances(state: &SessionState) -> Vec<&str> {
        state.accounts.iter().map(|a| a.balance.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initialize_empty_wallet() {
        let h = harness_on(Network::Testnet);
        assert_eq!(h.controller.state().phase, SessionPhase::Uninitialized);

        let state = h.controller.initialize().await.unwrap();
        assert_eq!(state.phase, SessionPhase::Ready);
        assert!(state.accounts.is_empty());
        assert_eq!(state.active_index, None);
        assert_eq!(state.network, Network::Testnet);
    }

    #[tokio::test]
    async fn test_initialize_restores_without_fetching() {
        let h = seeded(2, Network::Public).await;
        let state = h.controller.state();

        assert_eq!(state.network, Network::Public);
        assert_eq!(state.accounts.len(), 2);
        assert_eq!(state.active_index, Some(0));
        assert_eq!(
            state.balances,
            BalanceStatus::Cached {
                network: Network::Public
            }
        );
        assert_eq!(state.balance_of(1), Some("55.00"));
        assert_eq!(h.ledger.state.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_state_is_fatal() {
        let h = harness_on(Network::Testnet);
        h.store.set("starcade_wallet", "{not json").await.unwrap();

        let result = h.controller.initialize().await;
        assert!(matches!(result, Err(Error::CorruptState(_))));
        assert_eq!(h.controller.state().phase, SessionPhase::Uninitialized);
        assert!(matches!(
            h.controller.create_account(true).await,
            Err(Error::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_create_account_on_testnet_funds() {
        let h = harness_on(Network::Testnet);
        h.controller.initialize().await.unwrap();

        let created = h.controller.create_account(true).await.unwrap();
        assert_eq!(created.account.name, "Account 1");
        assert_eq!(created.account.balance, "0.00");
        assert!(created.funding_warning.is_none());
        assert_eq!(
            h.ledger.state.funded(),
            vec![(Network::Testnet, created.account.public_key.clone())]
        );

        let saved = h.persistence.load().await.unwrap().unwrap();
        assert_eq!(saved.accounts, vec![created.account.clone()]);
        assert_eq!(
            h.persistence
                .load_secret(&created.account.public_key)
                .await
                .unwrap(),
            Some(secret_for(1))
        );
        assert_eq!(h.controller.state().active_index, Some(0));
    }

    #[tokio::test]
    async fn test_funding_failure_is_a_warning() {
        let h = harness_on(Network::Testnet);
        h.controller.initialize().await.unwrap();
        h.ledger.state.fail_funding("friendbot unavailable");

        let created = h.controller.create_account(true).await.unwrap();
        assert!(created
            .funding_warning
            .as_deref()
            .unwrap()
            .contains("friendbot unavailable"));

        let saved = h.persistence.load().await.unwrap().unwrap();
        assert_eq!(saved.accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_create_account_on_public_skips_funding() {
        let h = harness_on(Network::Public);
        h.controller.initialize().await.unwrap();

        let created = h.controller.create_account(true).await.unwrap();
        assert!(created.funding_warning.is_none());
        assert!(h.ledger.state.funded().is_empty());
    }

    #[tokio::test]
    async fn test_create_account_names_and_activation() {
        let h = harness_on(Network::Public);
        h.controller.initialize().await.unwrap();

        h.controller.create_account(true).await.unwrap();
        let second = h.controller.create_account(false).await.unwrap();
        assert_eq!(second.account.name, "Account 2");
        assert_eq!(h.controller.state().active_index, Some(0));

        let third = h.controller.create_account(true).await.unwrap();
        assert_eq!(third.account.name, "Account 3");
        assert_eq!(h.controller.state().active_index, Some(2));
    }

    #[tokio::test]
    async fn test_import_rejects_duplicates_before_writing() {
        let h = harness_on(Network::Public);
        h.controller.initialize().await.unwrap();

        let account = h.controller.import_account(&secret_for(7)).await.unwrap();
        assert_eq!(account.public_key, public_for(7));
        assert!(h.ledger.state.funded().is_empty());

        let keys_before = h.store.inner.len();
        let result = h.controller.import_account(&secret_for(7)).await;
        assert!(matches!(result, Err(Error::DuplicateAccount(pk)) if pk == public_for(7)));
        assert_eq!(h.store.inner.len(), keys_before);
        assert_eq!(h.controller.state().accounts.len(), 1);

        assert!(matches!(
            h.controller.import_account("garbage").await,
            Err(Error::InvalidSecret(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_maps_failed_fetch_to_zero() {
        let h = seeded(3, Network::Testnet).await;
        h.ledger
            .state
            .set_balance(Network::Testnet, &public_for(100), "100.5");
        h.ledger.state.fail_fetch(&public_for(101));
        h.ledger
            .state
            .set_balance(Network::Testnet, &public_for(102), "7.1234567");

        let state = h.controller.refresh_balances().await;
        assert_eq!(balances(&state), vec!["100.50", "0.00", "7.12"]);
        assert_eq!(state.phase, SessionPhase::Ready);
        assert_eq!(
            state.balances,
            BalanceStatus::Settled {
                network: Network::Testnet
            }
        );

        let saved = h.persistence.load().await.unwrap().unwrap();
        let saved: Vec<&str> = saved.accounts.iter().map(|a| a.balance.as_str()).collect();
        assert_eq!(saved, vec!["100.50", "0.00", "7.12"]);
    }

    #[tokio::test]
    async fn test_switch_network_marks_balances_loading() {
        let h = seeded(2, Network::Testnet).await;
        h.ledger
            .state
            .set_balance(Network::Public, &public_for(100), "1.5");
        h.ledger
            .state
            .set_balance(Network::Public, &public_for(101), "2.5");
        h.ledger.state.close_gate();

        let mut rx = h.controller.subscribe();
        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                let done = state.balances
                    == BalanceStatus::Settled {
                        network: Network::Public,
                    };
                seen.push(state);
                if done {
                    break;
                }
            }
            seen
        });

        let controller = h.controller.clone();
        let switch = tokio::spawn(async move { controller.switch_network().await });

        let mut probe = h.controller.subscribe();
        let loading = probe
            .wait_for(|s| s.network == Network::Public)
            .await
            .unwrap()
            .clone();
        assert_eq!(loading.balances, BalanceStatus::Loading);
        assert_eq!(loading.balance_of(0), None);
        assert_eq!(loading.balance_of(1), None);

        h.ledger.state.open_gate();
        let state = switch.await.unwrap().unwrap();
        assert_eq!(state.network, Network::Public);
        assert_eq!(balances(&state), vec!["1.50", "2.50"]);

        for seen in observer.await.unwrap() {
            if seen.network == Network::Public {
                assert_ne!(seen.balance_of(0), Some("55.00"));
            }
        }

        let saved = h.persistence.load().await.unwrap().unwrap();
        assert_eq!(saved.network, Network::Public);
    }

    #[tokio::test]
    async fn test_stale_refresh_is_discarded_after_switch() {
        let h = seeded(1, Network::Testnet).await;
        h.ledger
            .state
            .set_balance(Network::Testnet, &public_for(100), "1");
        h.ledger
            .state
            .set_balance(Network::Public, &public_for(100), "2");
        h.ledger.state.close_gate();

        let controller = h.controller.clone();
        let stale = tokio::spawn(async move { controller.refresh_balances().await });
        h.controller
            .subscribe()
            .wait_for(|s| s.phase == SessionPhase::Refreshing)
            .await
            .unwrap();

        let controller = h.controller.clone();
        let switch = tokio::spawn(async move { controller.switch_network().await });
        h.controller
            .subscribe()
            .wait_for(|s| s.network == Network::Public)
            .await
            .unwrap();

        h.ledger.state.open_gate();
        stale.await.unwrap();
        switch.await.unwrap().unwrap();

        let state = h.controller.state();
        assert_eq!(state.network, Network::Public);
        assert_eq!(state.balance_of(0), Some("2.00"));
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_previous_network_balances() {
        let h = seeded(1, Network::Testnet).await;
        h.ledger
            .state
            .set_balance(Network::Public, &public_for(100), "999");
        h.store.fail_writes.store(true, Ordering::SeqCst);

        assert!(matches!(
            h.controller.switch_network().await,
            Err(Error::Storage(_))
        ));
        let state = h.controller.state();
        assert_eq!(state.network, Network::Testnet);
        assert_eq!(state.phase, SessionPhase::Ready);
        assert_eq!(
            state.balances,
            BalanceStatus::Cached {
                network: Network::Testnet
            }
        );
        assert_eq!(state.balance_of(0), Some("55.00"));

        // The next write must not carry the other network's balances
        h.store.fail_writes.store(false, Ordering::SeqCst);
        h.controller
            .rename_account(&public_for(100), "Savings")
            .await
            .unwrap();

        let saved = h.persistence.load().await.unwrap().unwrap();
        assert_eq!(saved.network, Network::Testnet);
        assert_eq!(saved.accounts[0].balance, "55.00");
        assert_eq!(saved.accounts[0].name, "Savings");
    }

    #[tokio::test]
    async fn test_send_without_secret_never_submits() {
        let h = seeded(1, Network::Testnet).await;
        h.persistence.remove_secret(&public_for(100)).await.unwrap();

        let intent = PaymentIntent::native(public_for(999), "5");
        let result = h.controller.send_payment(&public_for(100), intent).await;

        assert!(matches!(result, Err(Error::SecretUnavailable(pk)) if pk == public_for(100)));
        assert_eq!(h.ledger.state.submits(), 0);
        assert!(matches!(
            h.controller.state().phase,
            SessionPhase::TransactionSettled(TransactionOutcome::Failure(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_intent_never_reaches_ledger() {
        let h = seeded(1, Network::Testnet).await;
        let connects = h.ledger.connects.load(Ordering::SeqCst);

        let intent = PaymentIntent::native("GSHORT", "5");
        let result = h.controller.send_payment(&public_for(100), intent).await;
        assert!(matches!(result, Err(Error::InvalidDestination(_))));

        let intent = PaymentIntent::native(public_for(999), "-1");
        let result = h.controller.send_payment(&public_for(100), intent).await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));

        let intent = PaymentIntent::native(public_for(999), "0.00000001");
        let result = h.controller.send_payment(&public_for(100), intent).await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));

        assert_eq!(h.ledger.connects.load(Ordering::SeqCst), connects);
        assert_eq!(h.ledger.state.submits(), 0);
        assert_eq!(h.controller.state().phase, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn test_send_success_settles_and_refreshes() {
        let h = seeded(1, Network::Testnet).await;
        let intent = PaymentIntent::native(public_for(999), "5").with_memo("coffee");

        let receipt = h
            .controller
            .send_payment(&public_for(100), intent)
            .await
            .unwrap();
        assert!(receipt.result.success);
        assert_eq!(h.ledger.state.submits(), 1);
        assert_eq!(
            h.controller.state().last_transaction,
            Some(TransactionOutcome::Success(receipt.result.clone()))
        );

        h.ledger
            .state
            .set_balance(Network::Testnet, &public_for(100), "50");
        let refreshed = receipt.refresh.await.unwrap();
        assert_eq!(balances(&refreshed), vec!["50.00"]);
        assert_eq!(refreshed.phase, SessionPhase::Ready);
        assert!(refreshed.last_transaction.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_send_failure_message_is_verbatim() {
        let h = seeded(1, Network::Testnet).await;
        let message = "Transaction failed: Transaction Failed (tx_failed, op_underfunded)";
        h.ledger.state.fail_submit(message);

        let intent = PaymentIntent::native(public_for(999), "5");
        let err = h
            .controller
            .send_payment(&public_for(100), intent)
            .await
            .unwrap_err();

        assert!(matches!(&err, Error::TransactionFailed(m) if m == message));
        assert_eq!(err.to_string(), message);
        assert_eq!(
            h.controller.state().last_transaction,
            Some(TransactionOutcome::Failure(message.to_string()))
        );
    }

    #[tokio::test]
    async fn test_send_from_unknown_account() {
        let h = seeded(1, Network::Testnet).await;
        let intent = PaymentIntent::native(public_for(999), "5");
        assert!(matches!(
            h.controller.send_payment(&public_for(5), intent).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_active_account_bounds() {
        let h = seeded(3, Network::Testnet).await;

        assert!(matches!(
            h.controller.set_active_account(3).await,
            Err(Error::IndexOutOfRange { index: 3, count: 3 })
        ));

        h.controller.set_active_account(2).await.unwrap();
        assert_eq!(h.controller.state().active_index, Some(2));
        assert_eq!(
            h.controller.active_account().unwrap().public_key,
            public_for(102)
        );

        let saved = h.persistence.load().await.unwrap().unwrap();
        assert_eq!(saved.active_account_index, 2);
    }

    #[tokio::test]
    async fn test_rename_account() {
        let h = seeded(1, Network::Testnet).await;

        h.controller
            .rename_account(&public_for(100), "  Savings  ")
            .await
            .unwrap();
        assert_eq!(h.controller.state().accounts[0].name, "Savings");

        assert!(matches!(
            h.controller.rename_account(&public_for(100), "   ").await,
            Err(Error::InvalidName(_))
        ));
        assert!(matches!(
            h.controller.rename_account(&public_for(5), "x").await,
            Err(Error::NotFound(_))
        ));

        let saved = h.persistence.load().await.unwrap().unwrap();
        assert_eq!(saved.accounts[0].name, "Savings");
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let h = seeded(2, Network::Testnet).await;
        h.store.fail_writes.store(true, Ordering::SeqCst);

        let result = h.controller.rename_account(&public_for(100), "Savings").await;
        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(matches!(
            h.controller.set_active_account(1).await,
            Err(Error::Storage(_))
        ));
        assert!(h.controller.create_account(false).await.is_err());

        let state = h.controller.state();
        assert_eq!(state.accounts.len(), 2);
        assert_eq!(state.accounts[0].name, "Account 1");
        assert_eq!(state.active_index, Some(0));

        h.store.fail_writes.store(false, Ordering::SeqCst);
        h.controller.set_active_account(1).await.unwrap();
        assert_eq!(h.controller.state().active_index, Some(1));
    }

    #[tokio::test]
    async fn test_remove_account_retargets_active_index() {
        let h = seeded(3, Network::Testnet).await;
        h.controller.set_active_account(2).await.unwrap();

        h.controller.remove_account(&public_for(102)).await.unwrap();
        assert_eq!(h.controller.state().active_index, Some(1));
        assert_eq!(
            h.persistence.load_secret(&public_for(102)).await.unwrap(),
            None
        );

        h.controller.remove_account(&public_for(100)).await.unwrap();
        let state = h.controller.state();
        assert_eq!(state.active_index, Some(0));
        assert_eq!(state.accounts[0].public_key, public_for(101));

        assert!(matches!(
            h.controller.remove_account(&public_for(100)).await,
            Err(Error::NotFound(_))
        ));

        h.controller.remove_account(&public_for(101)).await.unwrap();
        assert_eq!(h.controller.state().active_index, None);
    }

    #[test]
    fn test_retarget() {
        assert_eq!(retarget(0, 0, 0), 0);
        assert_eq!(retarget(2, 0, 2), 1);
        assert_eq!(retarget(1, 1, 2), 1);
        assert_eq!(retarget(2, 2, 2), 1);
        assert_eq!(retarget(0, 1, 2), 0);
    }

    #[tokio::test]
    async fn test_fund_active_account() {
        let h = harness_on(Network::Public);
        h.controller.initialize().await.unwrap();
        assert!(matches!(
            h.controller.fund_active_account().await,
            Err(Error::NoActiveAccount)
        ));

        h.controller.create_account(true).await.unwrap();
        assert!(matches!(
            h.controller.fund_active_account().await,
            Err(Error::FundingUnavailable(_))
        ));

        let h = seeded(1, Network::Testnet).await;
        let state = h.controller.fund_active_account().await.unwrap();
        assert_eq!(balances(&state), vec!["10000.00"]);
    }

    #[tokio::test]
    async fn test_transaction_history() {
        let h = seeded(2, Network::Testnet).await;
        for (i, source) in [public_for(100), public_for(101), public_for(100)]
            .into_iter()
            .enumerate()
        {
            h.ledger.state.push_history(TransactionRecord {
                hash: format!("h{}", i),
                ledger: i as u64,
                created_at: chrono::Utc::now(),
                source_account: source,
                fee_charged: "100".to_string(),
                operation_count: 1,
                memo: None,
                successful: true,
            });
        }

        let records = h.controller.transaction_history(None, 10).await.unwrap();
        let hashes: Vec<&str> = records.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(hashes, vec!["h0", "h2"]);

        let records = h
            .controller
            .transaction_history(Some(&public_for(101)), 10)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);

        assert!(matches!(
            h.controller.transaction_history(Some("GX"), 10).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_wallet() {
        let h = seeded(2, Network::Public).await;
        assert_eq!(h.controller.estimate_fee(), "0.00001");

        let state = h.controller.reset_wallet().await.unwrap();
        assert!(state.accounts.is_empty());
        assert_eq!(state.network, Network::Public);
        assert!(h.store.inner.is_empty());
        assert_eq!(h.persistence.load().await.unwrap(), None);
    }
}
