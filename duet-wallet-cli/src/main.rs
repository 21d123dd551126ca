//! Duet Wallet command-line driver
//!
//! Wires configuration, logging and a JSON-file store into `WalletService`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use duet_wallet::storage::FileStore;
use duet_wallet::transaction::EthereumClient;
use duet_wallet::{Chain, WalletConfig, WalletService};
use duet_wallet_solana::SolanaClient;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Deterministic Ethereum and Solana wallet")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Wallet store file
    #[arg(short, long, default_value = "duet-wallet.json")]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Mnemonic management
    Mnemonic {
        #[command(subcommand)]
        action: MnemonicCommands,
    },
    /// Account management
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Fetch balances and recent activity of every account of a chain
    Refresh { chain: Chain },
    /// Send native currency and wait for confirmation
    Send {
        chain: Chain,
        from: String,
        to: String,
        amount: Decimal,
    },
}

#[derive(Subcommand)]
enum MnemonicCommands {
    /// Generate a mnemonic unless one exists
    Ensure {
        /// Print the phrase
        #[arg(long)]
        show: bool,
    },
    /// Replace the mnemonic with an existing phrase
    Import { phrase: String },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Create the next account, generating a mnemonic if needed
    Create { chain: Chain },
    /// Derive the next account from the existing mnemonic
    Add { chain: Chain },
    /// List accounts
    List { chain: Chain },
    /// Remove an account by address
    Remove { chain: Chain, address: String },
    /// Re-derive the first COUNT accounts of an imported mnemonic
    Restore { chain: Chain, count: u32 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = WalletConfig::from_env();
    info!(network = ?config.network, store = %cli.store.display(), "starting duet wallet");

    let store = FileStore::open(&cli.store)
        .with_context(|| format!("failed to open wallet store {}", cli.store.display()))?;
    let ethereum =
        EthereumClient::new(config.ethereum.clone())?.with_scan_depth(config.ethereum_scan_depth);
    let solana = SolanaClient::new(config.solana.clone())?;

    let service = WalletService::new(Arc::new(store))
        .with_client(Arc::new(ethereum))
        .with_client(Arc::new(solana))
        .with_refresh_config(config.refresh);

    match cli.command {
        Commands::Mnemonic { action } => handle_mnemonic_command(&service, action)?,
        Commands::Account { action } => handle_account_command(&service, action).await?,
        Commands::Refresh { chain } => handle_refresh(&service, chain).await?,
        Commands::Send { chain, from, to, amount } => {
            let id = service.send_transfer(chain, &from, &to, amount).await?;
            println!("{}", id);
        }
    }

    Ok(())
}

fn handle_mnemonic_command(
    service: &WalletService,
    action: MnemonicCommands,
) -> anyhow::Result<()> {
    match action {
        MnemonicCommands::Ensure { show } => {
            let mnemonic = service.ensure_mnemonic()?;
            if show {
                println!("{}", mnemonic);
            } else {
                println!("mnemonic present ({} words)", mnemonic.word_count());
            }
        }
        MnemonicCommands::Import { phrase } => {
            let mnemonic = service.import_mnemonic(&phrase)?;
            println!("imported {}-word mnemonic", mnemonic.word_count());
        }
    }
    Ok(())
}

async fn handle_account_command(
    service: &WalletService,
    action: AccountCommands,
) -> anyhow::Result<()> {
    match action {
        AccountCommands::Create { chain } => {
            let created = service.create_account(chain).await?;
            let (index, address) = (created.account.index(), created.account.address());
            match created.balance {
                Ok(balance) => println!("{}\t{}\t{} {}", index, address, balance, chain.symbol()),
                Err(e) => println!("{}\t{}\tbalance unavailable: {}", index, address, e),
            }
        }
        AccountCommands::Add { chain } => {
            let account = service.add_account(chain)?;
            println!("{}\t{}", account.index(), account.address());
        }
        AccountCommands::List { chain } => {
            for account in service.list_accounts(chain)? {
                let path = account.derivation_path();
                println!("{}\t{}\t{}", account.index(), account.address(), path);
            }
        }
        AccountCommands::Remove { chain, address } => {
            if !service.remove_account(chain, &address)? {
                bail!("no {} account {}", chain, address);
            }
            println!("removed {}", address);
        }
        AccountCommands::Restore { chain, count } => {
            for account in service.restore_accounts(chain, count)? {
                println!("{}\t{}", account.index(), account.address());
            }
        }
    }
    Ok(())
}

async fn handle_refresh(service: &WalletService, chain: Chain) -> anyhow::Result<()> {
    let snapshot = service.refresh(chain).await?;

    for account in service.list_accounts(chain)? {
        match snapshot.balances.get(account.address()) {
            Some(balance) => println!("{}\t{} {}", account.address(), balance, chain.symbol()),
            None => println!("{}\tunavailable", account.address()),
        }
    }
    println!("total\t{} {}", snapshot.total_balance(), chain.symbol());

    for tx in snapshot.recent_activity() {
        let when = tx.timestamp.map_or_else(|| "-".to_string(), |ts| ts.to_string());
        println!("{}\t{:?}\t{}", when, tx.status, tx.id);
    }

    for failure in &snapshot.failures {
        eprintln!("{} {:?} failed: {}", failure.address, failure.stage, failure.error);
    }
    Ok(())
}
