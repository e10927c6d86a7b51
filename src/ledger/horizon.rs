//! Horizon gateway client
//!
//! Reads are retried with exponential backoff on transient failures
//! (connection errors, 5xx, 429). Submissions and funding are single attempts.
//!
//! API Documentation: https://developers.stellar.org/docs/data/horizon

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::wallet::{Network, NetworkConfig, PaymentIntent, TransactionResult};

use super::envelope::{self, EnvelopeParams};
use super::keys;
use super::{
    AccountDetails, Keypair, LedgerClient, LedgerConnector, TransactionRecord, BASE_FEE_STROOPS,
};

/// Testnet faucet
pub const DEFAULT_FRIENDBOT_URL: &str = "https://friendbot.stellar.org";

/// Seconds a signed transaction stays valid
const TX_TIMEOUT_SECS: u64 = 30;

/// HTTP settings shared by all clients
#[derive(Debug, Clone)]
pub struct HorizonSettings {
    pub timeout: Duration,

    /// Total time budget for retrying a read
    pub retry_budget: Duration,

    pub friendbot_url: String,
}

impl Default for HorizonSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_budget: Duration::from_secs(5),
            friendbot_url: DEFAULT_FRIENDBOT_URL.to_string(),
        }
    }
}

/// Successful submission response
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
    ledger: u64,
    successful: bool,
}

/// Horizon problem document
#[derive(Debug, Default, Deserialize)]
struct Problem {
    #[serde(default)]
    title: String,

    #[serde(default)]
    detail: String,

    #[serde(default)]
    extras: Option<ProblemExtras>,
}

#[derive(Debug, Default, Deserialize)]
struct ProblemExtras {
    #[serde(default)]
    result_codes: Option<ResultCodes>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultCodes {
    #[serde(default)]
    transaction: Option<String>,

    #[serde(default)]
    operations: Vec<String>,
}

impl Problem {
    /// "Transaction Failed (tx_failed: op_underfunded)"
    fn summary(&self) -> String {
        let codes = self
            .extras
            .as_ref()
            .and_then(|e| e.result_codes.as_ref())
            .map(|c| {
                let mut parts: Vec<String> = c.transaction.iter().cloned().collect();
                parts.extend(c.operations.iter().cloned());
                parts.join(", ")
            })
            .unwrap_or_default();

        let title = if self.title.is_empty() {
            self.detail.as_str()
        } else {
            self.title.as_str()
        };

        if codes.is_empty() {
            title.to_string()
        } else {
            format!("{} ({})", title, codes)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<T>,
}

#[derive(Debug, Deserialize)]
struct Embedded<T> {
    records: Vec<T>,
}

/// Ledger client backed by a Horizon gateway
pub struct HorizonClient {
    client: Client,
    network: Network,
    base_url: String,
    settings: HorizonSettings,
}

impl HorizonClient {
    /// Create a client for one network
    pub fn new(config: &NetworkConfig, settings: HorizonSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config, settings))
    }

    /// Create a client reusing an existing HTTP connection pool
    pub fn with_client(client: Client, config: &NetworkConfig, settings: HorizonSettings) -> Self {
        let base_url = config.gateway_url().trim_end_matches('/').to_string();
        debug!("Horizon client for {} at {}", config.network, base_url);

        Self {
            client,
            network: config.network,
            base_url,
            settings,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET with retry on transient failures
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(self.settings.retry_budget),
            ..Default::default()
        };

        let client = &self.client;
        retry(backoff, || async move {
            let response = client.get(url).send().await.map_err(|e| {
                warn!("Gateway request failed: {}", e);
                backoff::Error::transient(Error::Ledger(e.to_string()))
            })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(backoff::Error::permanent(Error::Ledger(format!(
                    "Resource not found: {}",
                    url
                ))));
            }

            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                warn!("Gateway returned {} for {}, retrying", status, url);
                return Err(backoff::Error::transient(Error::Ledger(format!(
                    "Gateway returned {}",
                    status
                ))));
            }

            if !status.is_success() {
                let problem: Problem = response.json().await.unwrap_or_default();
                return Err(backoff::Error::permanent(Error::Ledger(format!(
                    "Gateway returned {}: {}",
                    status,
                    problem.summary()
                ))));
            }

            response.json::<T>().await.map_err(|e| {
                backoff::Error::permanent(Error::Ledger(format!("Malformed response: {}", e)))
            })
        })
        .await
    }

    async fn submit_envelope(&self, xdr: &str) -> Result<TransactionResult> {
        let url = format!("{}/transactions", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[("tx", xdr)])
            .send()
            .await
            .map_err(|e| Error::TransactionFailed(format!("Transaction failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let problem: Problem = response.json().await.unwrap_or_default();
            return Err(Error::TransactionFailed(format!(
                "Transaction failed: {}",
                problem.summary()
            )));
        }

        let body: SubmitResponse = response.json().await.map_err(|e| {
            Error::TransactionFailed(format!("Transaction failed: malformed response: {}", e))
        })?;

        Ok(TransactionResult {
            hash: body.hash,
            ledger: body.ledger,
            success: body.successful,
        })
    }
}

#[async_trait]
impl LedgerClient for HorizonClient {
    fn network(&self) -> Network {
        self.network
    }

    fn generate_keypair(&self) -> Result<Keypair> {
        Ok(keys::generate())
    }

    fn import_from_secret(&self, secret_key: &str) -> Result<Keypair> {
        keys::keypair_from_secret(secret_key)
    }

    async fn fetch_account_details(&self, public_key: &str) -> Result<AccountDetails> {
        let url = format!("{}/accounts/{}", self.base_url, public_key);
        self.get_json(&url)
            .await
            .map_err(|e| Error::Ledger(format!("Failed to load account: {}", e)))
    }

    async fn submit_payment(
        &self,
        secret_key: &str,
        intent: &PaymentIntent,
    ) -> Result<TransactionResult> {
        let signing_key = keys::signing_key_from_secret(secret_key)?;
        let source = keys::encode_public_key(signing_key.verifying_key().to_bytes());

        let account = self
            .fetch_account_details(&source)
            .await
            .map_err(|e| Error::TransactionFailed(format!("Transaction failed: {}", e)))?;

        let sequence: i64 = account.sequence.parse().map_err(|_| {
            Error::TransactionFailed(format!(
                "Transaction failed: invalid sequence {}",
                account.sequence
            ))
        })?;

        let params = EnvelopeParams {
            network: self.network,
            sequence: sequence + 1,
            fee: BASE_FEE_STROOPS,
            valid_until: chrono::Utc::now().timestamp().max(0) as u64 + TX_TIMEOUT_SECS,
        };

        let signed = envelope::build_payment(&signing_key, intent, params)?;
        debug!("Submitting transaction {} from {}", signed.hash, source);

        let result = self.submit_envelope(&signed.xdr).await?;
        info!(
            "Payment of {} to {} settled in ledger {} (hash: {})",
            intent.amount, intent.destination, result.ledger, result.hash
        );
        Ok(result)
    }

    async fn request_testnet_funding(&self, public_key: &str) -> Result<()> {
        if self.network != Network::Testnet {
            return Err(Error::FundingUnavailable(
                "Account funding is only available on testnet".to_string(),
            ));
        }

        let response = self
            .client
            .get(&self.settings.friendbot_url)
            .query(&[("addr", public_key)])
            .send()
            .await
            .map_err(|e| Error::Ledger(format!("Failed to fund account: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Ledger(format!(
                "Failed to fund account: friendbot returned {}",
                response.status()
            )));
        }

        info!("Funded {} on testnet", public_key);
        Ok(())
    }

    async fn fetch_transaction_history(
        &self,
        public_key: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>> {
        let url = format!(
            "{}/accounts/{}/transactions?limit={}&order=desc",
            self.base_url, public_key, limit
        );

        let page: Page<TransactionRecord> = self
            .get_json(&url)
            .await
            .map_err(|e| Error::Ledger(format!("Failed to get transaction history: {}", e)))?;
        Ok(page.embedded.records)
    }
}

/// Builds Horizon clients sharing one HTTP pool
pub struct HorizonConnector {
    client: Client,
    settings: HorizonSettings,
}

impl HorizonConnector {
    pub fn new(settings: HorizonSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }
}

impl LedgerConnector for HorizonConnector {
    fn connect(&self, config: &NetworkConfig) -> Result<Arc<dyn LedgerClient>> {
        url::Url::parse(config.gateway_url()).map_err(|e| {
            Error::Config(format!("Invalid gateway URL {}: {}", config.gateway_url(), e))
        })?;

        Ok(Arc::new(HorizonClient::with_client(
            self.client.clone(),
            config,
            self.settings.clone(),
        )))
    }
}
