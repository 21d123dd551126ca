//! Ethereum chain client

use async_trait::async_trait;
use std::ops::RangeInclusive;

use ethers::prelude::{
    Address, Http, LocalWallet, Middleware, Provider, ProviderError, Signer, SignerMiddleware,
    TransactionRequest as EthersTransactionRequest, H256, U256, U64,
};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Block, Transaction as EthersTransaction};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::account::is_valid_address;
use crate::crypto::keys::{ethereum::to_checksum_address, Chain};
use crate::error::{Error, Result};
use super::provider::ProviderConfig;
use super::types::{ChainClient, ChainTransaction, TransactionId, TransactionStatus, TransferState};
use super::units::{from_base_units, to_base_units};

/// Number of recent blocks scanned for account history
pub const DEFAULT_SCAN_DEPTH: u64 = 2000;

/// Blocks fetched concurrently during a history scan
const BLOCK_FETCH_CONCURRENCY: usize = 8;

/// Ethereum client over JSON-RPC
pub struct EthereumClient {
    config: ProviderConfig,
    provider: Provider<Http>,
    scan_depth: u64,
}

impl EthereumClient {
    /// Create a new Ethereum client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.url).map_err(|e| {
            Error::Configuration(format!("Invalid Ethereum RPC URL {}: {}", config.url, e))
        })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let provider = Provider::new(Http::new_with_client(url, http_client));

        Ok(Self {
            config,
            provider,
            scan_depth: DEFAULT_SCAN_DEPTH,
        })
    }

    /// Scan `depth` blocks back from the tip when reading history
    pub fn with_scan_depth(mut self, depth: u64) -> Self {
        self.scan_depth = depth.max(1);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Receipt status of `hash`; `Pending` when the receipt cannot be read
    async fn receipt_status(&self, hash: H256) -> TransactionStatus {
        match self.provider.get_transaction_receipt(hash).await {
            Ok(None) => TransactionStatus::Pending,
            Ok(Some(receipt)) if receipt.status == Some(U64::zero()) => TransactionStatus::Failed,
            Ok(Some(_)) => TransactionStatus::Confirmed,
            Err(e) => {
                debug!(tx = ?hash, error = %e, "receipt unavailable; reporting pending");
                TransactionStatus::Pending
            }
        }
    }
}

/// Blocks scanned for history: the `depth` most recent ones ending at `latest`
fn block_window(latest: u64, depth: u64) -> RangeInclusive<u64> {
    latest.saturating_sub(depth.max(1) - 1)..=latest
}

/// Append transactions of `block` sent by or to `target`, newest first, until
/// `matches` holds `limit` entries. Returns whether the limit was reached.
fn collect_matches(
    block: &Block<EthersTransaction>,
    target: Address,
    limit: usize,
    matches: &mut Vec<(EthersTransaction, Option<i64>)>,
) -> bool {
    let timestamp = i64::try_from(block.timestamp.low_u64()).ok();

    for tx in block.transactions.iter().rev() {
        if matches.len() >= limit {
            break;
        }
        if tx.from == target || tx.to == Some(target) {
            matches.push((tx.clone(), timestamp));
        }
    }
    matches.len() >= limit
}

fn to_chain_transaction(
    tx: &EthersTransaction,
    timestamp: Option<i64>,
    status: TransactionStatus,
) -> ChainTransaction {
    ChainTransaction {
        id: format!("{:?}", tx.hash),
        chain: Chain::Ethereum,
        from: Some(to_checksum_address(tx.from.as_bytes())),
        to: tx.to.map(|to| to_checksum_address(to.as_bytes())),
        amount: wei_to_ether(tx.value).ok(),
        status,
        timestamp,
        block: tx.block_number.map(|number| number.as_u64()),
    }
}

#[async_trait]
impl ChainClient for EthereumClient {
    fn chain(&self) -> Chain {
        Chain::Ethereum
    }

    async fn fetch_balance(&self, address: &str) -> Result<Decimal> {
        let address = parse_address(address).map_err(Error::InvalidAddress)?;

        let wei = self
            .provider
            .get_balance(address, None)
            .await
            .map_err(network_error)?;

        wei_to_ether(wei)
    }

    async fn fetch_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ChainTransaction>> {
        let target = parse_address(address).map_err(Error::InvalidAddress)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(network_error)?
            .as_u64();
        let window = block_window(latest, self.scan_depth);
        let oldest = *window.start();

        let provider = &self.provider;
        let mut blocks = stream::iter(window.rev())
            .map(|number| async move { provider.get_block_with_txs(number).await })
            .buffered(BLOCK_FETCH_CONCURRENCY);

        let mut matches = Vec::new();
        while let Some(block) = blocks.next().await {
            let Some(block) = block.map_err(network_error)? else {
                continue;
            };
            if collect_matches(&block, target, limit, &mut matches) {
                break;
            }
        }
        drop(blocks);

        debug!(
            address = %address, oldest, latest, found = matches.len(),
            "scanned Ethereum history"
        );

        let mut transactions = Vec::with_capacity(matches.len());
        for (tx, timestamp) in &matches {
            let status = self.receipt_status(tx.hash).await;
            transactions.push(to_chain_transaction(tx, *timestamp, status));
        }

        Ok(transactions)
    }

    async fn submit_transfer(
        &self,
        private_key: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TransactionId> {
        let mut state = TransferState::Constructed;

        if !is_valid_address(Chain::Ethereum, to) {
            return Err(Error::InvalidRecipient(to.to_string()));
        }
        let recipient = parse_address(to).map_err(Error::InvalidRecipient)?;
        let value = U256::from(to_base_units(Chain::Ethereum, amount)?);

        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(network_error)?;
        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| Error::Derivation(format!("Invalid Ethereum private key: {}", e)))?
            .with_chain_id(chain_id.low_u64());
        let from = wallet.address();

        let client = SignerMiddleware::new(self.provider.clone(), wallet);
        let mut tx: TypedTransaction = EthersTransactionRequest::new()
            .from(from)
            .to(recipient)
            .value(value)
            .into();
        client
            .fill_transaction(&mut tx, None)
            .await
            .map_err(|e| classify_submit_error(e.to_string()))?;

        let gas = tx.gas().copied().unwrap_or_default();
        let gas_price = tx.gas_price().unwrap_or_default();
        let required = gas
            .checked_mul(gas_price)
            .and_then(|fee| fee.checked_add(value))
            .ok_or_else(|| Error::InvalidAmount(format!("{} ETH is out of range", amount)))?;

        let balance = self
            .provider
            .get_balance(from, None)
            .await
            .map_err(network_error)?;
        if balance < required {
            return Err(Error::InsufficientFunds(format!(
                "balance {} ETH is below {} ETH plus fees",
                wei_to_ether(balance)?,
                amount
            )));
        }

        let signature = client
            .signer()
            .sign_transaction(&tx)
            .await
            .map_err(|e| Error::Derivation(format!("Failed to sign transaction: {}", e)))?;
        let raw = tx.rlp_signed(&signature);
        let tx_hash = format!("{:?}", tx.hash(&signature));
        state.advance(TransferState::Signed)?;

        let pending = match self.provider.send_raw_transaction(raw).await {
            Ok(pending) => pending,
            Err(e) => {
                let error = send_error(&tx_hash, e.to_string());
                state.record_failure(&error)?;
                return Err(error);
            }
        };
        state.advance(TransferState::Broadcast)?;
        info!(
            tx = %tx_hash, from = ?from, to = %to, amount = %amount,
            "Ethereum transfer broadcast"
        );

        let wait = self.config.confirmation_timeout();
        let confirmation = tokio::time::timeout(wait, pending.confirmations(1)).await;
        match confirmation {
            Err(_) => {
                warn!(tx = %tx_hash, "confirmation timed out");
                Err(Error::UnknownOutcome {
                    id: tx_hash,
                    reason: format!("not confirmed within {}s", self.config.confirmation_timeout),
                })
            }
            Ok(Err(e)) => {
                warn!(tx = %tx_hash, error = %e, "lost track of broadcast transfer");
                Err(Error::UnknownOutcome { id: tx_hash, reason: e.to_string() })
            }
            Ok(Ok(None)) => {
                state.advance(TransferState::Failed)?;
                Err(Error::BroadcastFailed(format!("{} was dropped from the mempool", tx_hash)))
            }
            Ok(Ok(Some(receipt))) if receipt.status == Some(U64::zero()) => {
                state.advance(TransferState::Failed)?;
                Err(Error::BroadcastFailed(format!("{} reverted", tx_hash)))
            }
            Ok(Ok(Some(_))) => {
                state.advance(TransferState::Confirmed)?;
                info!(tx = %tx_hash, "Ethereum transfer confirmed");
                Ok(tx_hash)
            }
        }
    }
}

fn parse_address(text: &str) -> std::result::Result<Address, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    digits
        .parse::<Address>()
        .map_err(|_| text.to_string())
}

fn wei_to_ether(wei: U256) -> Result<Decimal> {
    if wei > U256::from(u128::MAX) {
        return Err(Error::InvalidAmount(format!("{} wei is out of range", wei)));
    }
    from_base_units(Chain::Ethereum, wei.as_u128())
}

fn network_error(error: ProviderError) -> Error {
    Error::NetworkUnavailable(error.to_string())
}

/// Map a failed `eth_sendRawTransaction` to the error taxonomy
fn send_error(tx_hash: &str, message: String) -> Error {
    // A request that timed out may still have reached the node
    if message.to_lowercase().contains("timed out") {
        return Error::UnknownOutcome {
            id: tx_hash.to_string(),
            reason: message,
        };
    }
    classify_submit_error(message)
}

/// Map a node rejection to the error taxonomy
fn classify_submit_error(message: String) -> Error {
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") {
        Error::InsufficientFunds(message)
    } else if ["error sending request", "connection", "dns error", "timed out"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        Error::NetworkUnavailable(message)
    } else {
        Error::BroadcastFailed(message)
    }
}
