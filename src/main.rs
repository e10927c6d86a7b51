//! Qastra Wallet - multi-account Stellar wallet
//!
//! # WARNING
//! - Secret keys are stored in the wallet file; keep it private (chmod 600).
//! - PUBLIC network payments move real funds and cannot be reversed.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

// Use the library crate
use qastra_wallet::cli::commands;
use qastra_wallet::config::Config;

/// Qastra Wallet - accounts, balances and payments
#[derive(Parser)]
#[command(name = "qastra")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "qastra.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the wallet and show its status
    Init,

    /// Create a new account (funded automatically on testnet)
    Create,

    /// Import an account from its secret key
    Import {
        /// Secret key ("S...")
        #[arg(env = "QASTRA_IMPORT_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// List accounts with cached balances
    Accounts,

    /// Rename an account
    Rename {
        /// Account public key
        public_key: String,

        /// New name
        name: String,
    },

    /// Select the active account by index
    Use {
        index: usize,
    },

    /// Remove an account and its secret key
    Remove {
        /// Account public key
        public_key: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Refresh balances from the network
    Balances,

    /// Switch between PUBLIC and TESTNET
    Network,

    /// Send a payment
    Send {
        /// Sender public key (default: active account)
        #[arg(long)]
        from: Option<String>,

        /// Destination public key
        #[arg(long)]
        to: String,

        /// Amount, e.g. "10.5"
        #[arg(long)]
        amount: String,

        /// Text memo (max 28 bytes)
        #[arg(long)]
        memo: Option<String>,

        /// Asset code for non-native payments
        #[arg(long, requires = "asset_issuer")]
        asset_code: Option<String>,

        /// Asset issuer for non-native payments
        #[arg(long, requires = "asset_code")]
        asset_issuer: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Pay a scanned QR payment request
    Scan {
        /// Decoded QR text
        payload: String,

        /// Sender public key (default: active account)
        #[arg(long)]
        from: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Fund the active account from the testnet faucet
    Fund,

    /// Show recent transactions
    History {
        /// Account public key (default: active account)
        public_key: Option<String>,

        /// Number of records to show
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show the network base fee
    Fee,

    /// Erase all accounts and secret keys
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (credentials masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("qastra_wallet=info".parse()?),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = startup_checks(&config) {
        error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // Execute command
    let result = match cli.command {
        Commands::Init => commands::init(&config).await,
        Commands::Create => commands::create(&config).await,
        Commands::Import { secret } => commands::import(&config, &secret).await,
        Commands::Accounts => commands::accounts(&config).await,
        Commands::Rename { public_key, name } => {
            commands::rename(&config, &public_key, &name).await
        }
        Commands::Use { index } => commands::use_account(&config, index).await,
        Commands::Remove { public_key, force } => {
            commands::remove(&config, &public_key, force).await
        }
        Commands::Balances => commands::balances(&config).await,
        Commands::Network => commands::switch_network(&config).await,
        Commands::Send {
            from,
            to,
            amount,
            memo,
            asset_code,
            asset_issuer,
            force,
        } => {
            commands::send(
                &config,
                from.as_deref(),
                &to,
                &amount,
                memo,
                asset_code,
                asset_issuer,
                force,
            )
            .await
        }
        Commands::Scan {
            payload,
            from,
            force,
        } => commands::scan_payment(&config, &payload, from.as_deref(), force).await,
        Commands::Fund => commands::fund(&config).await,
        Commands::History { public_key, limit } => {
            commands::history(&config, public_key.as_deref(), limit).await
        }
        Commands::Fee => commands::fee(&config).await,
        Commands::Reset { force } => commands::reset(&config, force).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Refuse to run against a wallet file other users can read
fn startup_checks(config: &Config) -> Result<()> {
    let path = std::path::Path::new(&config.storage.path);
    if !path.exists() {
        info!("Wallet file {} will be created", path.display());
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std::fs::metadata(path)
            .map_err(|e| anyhow::anyhow!("Cannot read wallet file {}: {}", path.display(), e))?;
        let mode = metadata.permissions().mode();

        // Readable by group or others (not 600)
        if mode & 0o077 != 0 {
            return Err(anyhow::anyhow!(
                "Wallet file {} has insecure permissions {:o}. \
                 Run 'chmod 600 {}' to fix.",
                path.display(),
                mode & 0o777,
                path.display()
            ));
        }
    }

    if config.default_network()? == qastra_wallet::wallet::Network::Public {
        warn!("Default network is PUBLIC: payments move real funds");
    }

    Ok(())
}
