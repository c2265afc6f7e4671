//! chain-wallet: command-line driver for the wallet core.
//!
//! Loads the TOML config, sets up logging and metrics, and runs one
//! subcommand against the keystore and the configured node. Passwords are
//! read from environment variables, never from arguments.

use alloy::primitives::{Address, Bytes, U256};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use chain_wallet::blockchain::{broadcast, sign_transaction, ChainClient, HeaderSubscription, SubscriptionEvent, TxBuilder};
use chain_wallet::config::{load_config, WalletConfig};
use chain_wallet::keystore::KeystoreManager;
use chain_wallet::observability::{logging, metrics};
use chain_wallet::resilience::retries::{retry, RetryConfig};
use chain_wallet::transport::AlloyTransport;
use chain_wallet::BlockchainError;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "chain-wallet")]
#[command(about = "Keystore, chain queries and transfers against an Ethereum node", long_about = None)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment variable holding the account password.
    #[arg(long, default_value = "CHAIN_WALLET_PASSWORD")]
    password_env: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key and store it encrypted
    NewAccount,
    /// List indexed accounts
    Accounts,
    /// Import a key file, re-encrypting it with the account password
    Import {
        file: PathBuf,
        /// Environment variable holding the file's current password.
        #[arg(long, default_value = "CHAIN_WALLET_OLD_PASSWORD")]
        old_password_env: String,
    },
    /// Show the latest header
    Head,
    /// Show a block and its transactions
    Block { number: u64 },
    /// Stream new headers
    Watch {
        /// Also fetch each full block.
        #[arg(long)]
        bodies: bool,
    },
    /// Send a value transfer from a keystore account
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount in wei.
        #[arg(long)]
        value: String,
        /// Wait for the receipt.
        #[arg(long)]
        wait: bool,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WalletConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match cli.command {
        Commands::NewAccount => {
            let keystore = open_keystore(&config)?;
            let account = keystore.new_account(&password(&cli.password_env)?)?;
            println!("{}  {}", account.address, account.path.display());
        }
        Commands::Accounts => {
            let keystore = open_keystore(&config)?;
            for account in keystore.accounts() {
                println!("{}  {}", account.address, account.path.display());
            }
        }
        Commands::Import { file, old_password_env } => {
            let keystore = open_keystore(&config)?;
            let bytes = std::fs::read(&file)?;
            let account = keystore.import(
                &bytes,
                &password(&old_password_env)?,
                &password(&cli.password_env)?,
            )?;
            println!("{}  {}", account.address, account.path.display());
        }
        Commands::Head => {
            let client = connect(&config).await?;
            let header = retry(&RetryConfig::default(), || client.latest_header()).await?;
            println!("number     {}", header.number);
            println!("hash       {}", header.hash);
            println!("parent     {}", header.parent_hash);
            println!("timestamp  {}", header.timestamp);
            println!("difficulty {}", header.difficulty);
        }
        Commands::Block { number } => {
            let client = connect(&config).await?;
            let chain_id = client.chain_id().await?.0;
            let block = client.block_by_number(number).await?;
            let count = client.transaction_count(block.hash()).await?;
            println!("block {} {} ({} transactions)", block.number(), block.hash(), count);
            for tx in &block.transactions {
                let sender = tx
                    .sender(chain_id)
                    .ok()
                    .or(tx.from)
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let to = tx.to().map(|a| a.to_string()).unwrap_or_else(|| "(create)".to_string());
                println!("  {} {} -> {} value {}", tx.hash(), sender, to, tx.value());
            }
        }
        Commands::Watch { bodies } => {
            let client = connect(&config).await?;
            let mut subscription =
                HeaderSubscription::spawn(client.transport(), config.subscription.options());
            while let Some(event) = subscription.next().await {
                match event {
                    SubscriptionEvent::Header(header) => {
                        println!("{} {}", header.number, header.hash);
                        if bodies {
                            let block = client.block_by_hash(header.hash).await?;
                            println!("  {} transactions", block.transactions.len());
                        }
                    }
                    SubscriptionEvent::Error(e) => return Err(e.into()),
                }
            }
        }
        Commands::Transfer { from, to, value, wait } => {
            let from: Address = from.parse()?;
            let to: Address = to.parse()?;
            let value: U256 = value.parse()?;

            let keystore = open_keystore(&config)?;
            let account = keystore.find(&from).ok_or_else(|| BlockchainError::NotFound {
                entity: "account",
                target: from.to_string(),
            })?;

            let client = connect(&config).await?;
            let builder = TxBuilder::new(client, config.transactions.transfer_settings());
            let (tx, chain_id) = builder.prepare(from, to, value, Bytes::new()).await?;
            let signed = keystore.with_unlocked(&account, &password(&cli.password_env)?, |key| {
                sign_transaction(tx, key, chain_id)
            })?;
            let hash = broadcast(builder.client(), &signed).await?;
            println!("{}", hash);

            if wait {
                let receipt = builder.wait_for_receipt(hash).await?;
                println!(
                    "status {:?} block {} gas used {}",
                    receipt.status,
                    receipt.block_number.map(|n| n.to_string()).unwrap_or_default(),
                    receipt.gas_used
                );
            }
        }
    }

    Ok(())
}

fn open_keystore(config: &WalletConfig) -> CliResult<KeystoreManager> {
    Ok(KeystoreManager::open(
        config.keystore.dir.clone(),
        config.keystore.scrypt_params(),
    )?)
}

async fn connect(config: &WalletConfig) -> CliResult<ChainClient> {
    let endpoint = config.rpc.resolved_endpoint();
    let transport = AlloyTransport::connect(&endpoint)
        .await
        .map_err(|e| BlockchainError::from_transport("connect", "rpc endpoint", e))?;
    let client = ChainClient::new(Arc::new(transport)).with_timeout(config.rpc.request_timeout());

    if let Some(expected) = config.rpc.expected_chain_id {
        client.verify_chain_id(expected).await?;
    }
    Ok(client)
}

fn password(var: &str) -> CliResult<String> {
    std::env::var(var).map_err(|_| format!("set {} to the account password", var).into())
}
