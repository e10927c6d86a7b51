//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::Confirm;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{CipherKind, Config};
use crate::ledger::HorizonConnector;
use crate::scan;
use crate::session::{SessionController, SessionState};
use crate::storage::{JsonFileStore, PlaintextCipher, SecretCipher};
use crate::wallet::{PaymentIntent, WalletPersistence};

/// Open the wallet file and load the session
pub async fn open_session(config: &Config) -> Result<SessionController> {
    let store = JsonFileStore::open(&config.storage.path)
        .await
        .with_context(|| format!("Failed to open wallet file {}", config.storage.path))?;

    let cipher: Arc<dyn SecretCipher> = match config.storage.cipher {
        CipherKind::Plaintext => Arc::new(PlaintextCipher),
    };
    info!("Secret cipher: {}", cipher.name());

    let persistence = WalletPersistence::new(Arc::new(store), cipher, config.storage_keys());
    let connector = HorizonConnector::new(config.horizon_settings())?;
    let controller =
        SessionController::new(persistence, Arc::new(connector), config.session_settings()?);

    controller
        .initialize()
        .await
        .context("Failed to load wallet")?;
    Ok(controller)
}

fn short(public_key: &str) -> String {
    let chars: Vec<char> = public_key.chars().collect();
    if chars.len() > 12 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 6..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        public_key.to_string()
    }
}

fn print_accounts(state: &SessionState) {
    println!("\n=== ACCOUNTS ({}) ===\n", state.network);

    if state.accounts.is_empty() {
        println!("No accounts. Run 'qastra create' or 'qastra import <secret>'.");
        println!();
        return;
    }

    println!("{:<4} {:<3} {:<20} {:<18} {}", "#", "", "NAME", "BALANCE", "PUBLIC KEY");
    println!("{}", "-".repeat(80));

    for (i, account) in state.accounts.iter().enumerate() {
        let marker = if state.active_index == Some(i) { "*" } else { "" };
        let balance = state
            .balance_of(i)
            .map(|b| format!("{} XLM", b))
            .unwrap_or_else(|| "(loading)".to_string());

        println!(
            "{:<4} {:<3} {:<20} {:<18} {}",
            i, marker, account.name, balance, account.public_key
        );
    }
    println!();
}

/// Show wallet status
pub async fn init(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    let state = session.state();

    println!("Wallet file: {}", config.storage.path);
    println!("Network: {}", state.network);
    print_accounts(&state);
    Ok(())
}

pub async fn create(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    let is_first = session.state().accounts.is_empty();

    let created = session.create_account(is_first).await?;
    println!("Created {}: {}", created.account.name, created.account.public_key);

    match created.funding_warning {
        Some(warning) => {
            warn!("Account created but not funded: {}", warning);
            println!("Funding failed: {} (retry with 'qastra fund')", warning);
        }
        None if session.state().network == crate::wallet::Network::Testnet => {
            let state = session.refresh_balances().await;
            if let Some(i) = state
                .accounts
                .iter()
                .position(|a| a.public_key == created.account.public_key)
            {
                println!("Funded on testnet, balance {} XLM", state.accounts[i].balance);
            }
        }
        None => {}
    }
    Ok(())
}

pub async fn import(config: &Config, secret: &str) -> Result<()> {
    let session = open_session(config).await?;
    let account = session.import_account(secret).await?;
    println!("Imported {}: {}", account.name, account.public_key);
    Ok(())
}

pub async fn accounts(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    print_accounts(&session.state());
    Ok(())
}

pub async fn rename(config: &Config, public_key: &str, name: &str) -> Result<()> {
    let session = open_session(config).await?;
    session.rename_account(public_key, name).await?;
    println!("Renamed {} to {}", short(public_key), name.trim());
    Ok(())
}

pub async fn use_account(config: &Config, index: usize) -> Result<()> {
    let session = open_session(config).await?;
    session.set_active_account(index).await?;

    if let Some(account) = session.active_account() {
        println!("Active account: {} ({})", account.name, account.public_key);
    }
    Ok(())
}

pub async fn remove(config: &Config, public_key: &str, force: bool) -> Result<()> {
    let session = open_session(config).await?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Remove account {} and its secret key? This cannot be undone.",
                short(public_key)
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Remove cancelled by user");
            return Ok(());
        }
    }

    let account = session.remove_account(public_key).await?;
    println!("Removed {} ({})", account.name, account.public_key);
    Ok(())
}

pub async fn balances(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    let state = session.refresh_balances().await;
    print_accounts(&state);
    Ok(())
}

pub async fn switch_network(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    let state = session.switch_network().await?;
    println!("Switched to {}", state.network);
    print_accounts(&state);
    Ok(())
}

/// Submit a payment and wait for the follow-up refresh
async fn submit(session: &SessionController, from: Option<&str>, intent: PaymentIntent) -> Result<()> {
    let from = match from {
        Some(pk) => pk.to_string(),
        None => session
            .active_account()
            .map(|a| a.public_key)
            .ok_or(crate::error::Error::NoActiveAccount)?,
    };

    match session.send_payment(&from, intent).await {
        Ok(receipt) => {
            println!("\nPayment submitted!");
            println!("Hash: {}", receipt.result.hash);
            println!("Ledger: {}", receipt.result.ledger);

            let state = receipt.refresh.await.context("Balance refresh failed")?;
            print_accounts(&state);
            Ok(())
        }
        Err(e) => {
            error!("Payment failed: {}", e);
            Err(e.into())
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn send(
    config: &Config,
    from: Option<&str>,
    to: &str,
    amount: &str,
    memo: Option<String>,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
    force: bool,
) -> Result<()> {
    let session = open_session(config).await?;

    let intent = PaymentIntent {
        destination: to.to_string(),
        amount: amount.to_string(),
        asset_code,
        asset_issuer,
        memo,
    };
    crate::wallet::validator::validate(&intent)?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Send {} {} to {} on {}?",
                intent.amount,
                intent.asset_code.as_deref().unwrap_or("XLM"),
                short(&intent.destination),
                session.state().network
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Payment cancelled by user");
            return Ok(());
        }
    }

    submit(&session, from, intent).await
}

pub async fn scan_payment(config: &Config, payload: &str, from: Option<&str>, force: bool) -> Result<()> {
    let scanned = scan::decode(payload)?;

    println!("\n=== PAYMENT REQUEST ===\n");
    println!("To: {}", scanned.destination);
    println!("Amount: {} XLM", scanned.amount);
    if let Some(memo) = &scanned.memo {
        println!("Memo: {}", memo);
    }
    println!();

    let intent: PaymentIntent = scanned.into();
    crate::wallet::validator::validate(&intent)?;

    let session = open_session(config).await?;
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Pay this request on {}?", session.state().network))
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Payment cancelled by user");
            return Ok(());
        }
    }

    submit(&session, from, intent).await
}

pub async fn fund(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    let state = session.fund_active_account().await?;
    print_accounts(&state);
    Ok(())
}

pub async fn history(config: &Config, public_key: Option<&str>, limit: Option<u32>) -> Result<()> {
    let session = open_session(config).await?;
    let limit = limit.unwrap_or(config.session.history_limit);
    let records = session.transaction_history(public_key, limit).await?;

    println!("\n=== TRANSACTIONS ===\n");
    if records.is_empty() {
        println!("No transactions.");
        println!();
        return Ok(());
    }

    println!("{:<20} {:<10} {:<8} {:<6} {}", "TIME", "LEDGER", "STATUS", "OPS", "HASH");
    println!("{}", "-".repeat(80));
    for record in records {
        println!(
            "{:<20} {:<10} {:<8} {:<6} {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.ledger,
            if record.successful { "ok" } else { "failed" },
            record.operation_count,
            record.hash
        );
        if let Some(memo) = record.memo.filter(|m| !m.is_empty()) {
            println!("  memo: {}", memo);
        }
    }
    println!();
    Ok(())
}

pub async fn fee(config: &Config) -> Result<()> {
    let session = open_session(config).await?;
    println!("Base fee: {} XLM per operation", session.estimate_fee());
    Ok(())
}

pub async fn reset(config: &Config, force: bool) -> Result<()> {
    if !force {
        let confirmed = Confirm::new()
            .with_prompt("Erase ALL accounts and secret keys? This cannot be undone.")
            .default(false)
            .interact()?;

        if !confirmed {
            info!("Reset cancelled by user");
            return Ok(());
        }
    }

    let session = open_session(config).await?;
    session.reset_wallet().await?;
    println!("Wallet erased.");
    Ok(())
}

/// Show current configuration (credentials masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
