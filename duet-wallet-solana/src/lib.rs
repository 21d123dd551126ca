//! Solana implementation for Duet Wallet Core
//!
//! This crate provides the Solana chain client: native balances, recent
//! signatures of an address, and confirmed SOL transfers over JSON-RPC.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::{Result as TransactionResult, Transaction as SolTransaction},
};
use solana_transaction_status::TransactionConfirmationStatus;
use tracing::{debug, info, warn};

use duet_wallet::account::is_valid_address;
use duet_wallet::crypto::keys::Chain;
use duet_wallet::error::{Error, Result};
use duet_wallet::transaction::provider::{ProviderConfig, DEFAULT_TIMEOUT_SECS};
use duet_wallet::transaction::units::{from_base_units, to_base_units};
use duet_wallet::transaction::{
    ChainClient, ChainTransaction, TransactionId, TransactionStatus, TransferState,
};

/// Interval between signature status polls while waiting for confirmation
const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The RPC caps signature listings at this many entries
const MAX_SIGNATURES_PER_REQUEST: usize = 1000;

/// Solana client
pub struct SolanaClient {
    config: ProviderConfig,
    client: RpcClient,
}

impl SolanaClient {
    /// Create a new Solana client at `confirmed` commitment
    pub fn new(config: ProviderConfig) -> Result<Self> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(Error::Configuration(format!("Invalid Solana RPC URL: {}", config.url)));
        }

        let timeout = config
            .request_timeout()
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let client = RpcClient::new_with_timeout_and_commitment(
            config.url.clone(),
            timeout,
            CommitmentConfig::confirmed(),
        );

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Wait until `signature` is confirmed or fails, or until the
    /// confirmation timeout elapses.
    ///
    /// A signature still unseen once `blockhash` has expired can never land,
    /// so the transfer is reported failed right away.
    async fn await_confirmation(&self, signature: &Signature, blockhash: &Hash) -> Result<()> {
        let wait = async {
            loop {
                // Expiry is read before the status
                let expired = match self
                    .client
                    .is_blockhash_valid(blockhash, self.client.commitment())
                    .await
                {
                    Ok(valid) => !valid,
                    Err(e) => {
                        debug!(%signature, error = %e, "blockhash check failed; retrying");
                        false
                    }
                };

                match self.client.get_signature_status(signature).await {
                    Ok(status) => {
                        if let Some(result) = settle(signature, status) {
                            return result;
                        }
                    }
                    Err(e) => debug!(%signature, error = %e, "status poll failed; retrying"),
                }

                if expired && !self.seen_at_processed(signature).await {
                    return Err(expired_error(signature));
                }
                tokio::time::sleep(CONFIRMATION_POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(self.config.confirmation_timeout(), wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::UnknownOutcome {
                id: signature.to_string(),
                reason: format!("not confirmed within {}s", self.config.confirmation_timeout),
            }),
        }
    }

    /// Whether `signature` may be in a block not yet confirmed. Lookup
    /// failures count as seen.
    async fn seen_at_processed(&self, signature: &Signature) -> bool {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, CommitmentConfig::processed())
            .await;
        !matches!(status, Ok(None))
    }
}

#[async_trait]
impl ChainClient for SolanaClient {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    async fn fetch_balance(&self, address: &str) -> Result<Decimal> {
        let pubkey = parse_pubkey(address).map_err(Error::InvalidAddress)?;

        let lamports = self
            .client
            .get_balance(&pubkey)
            .await
            .map_err(read_error)?;

        from_base_units(Chain::Solana, u128::from(lamports))
    }

    async fn fetch_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ChainTransaction>> {
        let pubkey = parse_pubkey(address).map_err(Error::InvalidAddress)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit.min(MAX_SIGNATURES_PER_REQUEST)),
            ..Default::default()
        };
        let signatures = self
            .client
            .get_signatures_for_address_with_config(&pubkey, config)
            .await
            .map_err(read_error)?;

        debug!(address = %address, found = signatures.len(), "fetched Solana signatures");
        Ok(signatures.into_iter().map(to_chain_transaction).collect())
    }

    async fn submit_transfer(
        &self,
        private_key: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TransactionId> {
        let mut state = TransferState::Constructed;

        if !is_valid_address(Chain::Solana, to) {
            return Err(Error::InvalidRecipient(to.to_string()));
        }
        let recipient = parse_pubkey(to).map_err(Error::InvalidRecipient)?;
        let lamports = u64::try_from(to_base_units(Chain::Solana, amount)?)
            .map_err(|_| Error::InvalidAmount(format!("{} SOL is out of range", amount)))?;

        let keypair = private_key_to_keypair(private_key)?;
        let payer = keypair.pubkey();

        let blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(read_error)?;
        let instruction = system_instruction::transfer(&payer, &recipient, lamports);
        let message = Message::new_with_blockhash(&[instruction], Some(&payer), &blockhash);

        let fee = self
            .client
            .get_fee_for_message(&message)
            .await
            .map_err(read_error)?;
        let balance = self
            .client
            .get_balance(&payer)
            .await
            .map_err(read_error)?;
        if u128::from(balance) < u128::from(lamports) + u128::from(fee) {
            return Err(Error::InsufficientFunds(format!(
                "balance {} SOL is below {} SOL plus fees",
                from_base_units(Chain::Solana, u128::from(balance))?,
                amount
            )));
        }

        let transaction = SolTransaction::new(&[&keypair], message, blockhash);
        let signature = transaction.signatures[0];
        state.advance(TransferState::Signed)?;

        if let Err(e) = self.client.send_transaction(&transaction).await {
            let error = submit_error(&signature, e);
            state.record_failure(&error)?;
            return Err(error);
        }
        state.advance(TransferState::Broadcast)?;
        info!(%signature, from = %payer, to = %to, amount = %amount, "Solana transfer broadcast");

        match self.await_confirmation(&signature, &blockhash).await {
            Ok(()) => {
                state.advance(TransferState::Confirmed)?;
                info!(%signature, "Solana transfer confirmed");
                Ok(signature.to_string())
            }
            Err(e) => {
                state.record_failure(&e)?;
                warn!(%signature, error = %e, "Solana transfer not confirmed");
                Err(e)
            }
        }
    }
}

fn parse_pubkey(text: &str) -> std::result::Result<Pubkey, String> {
    Pubkey::from_str(text).map_err(|_| text.to_string())
}

/// Decode a base-58 64-byte keypair (secret || public)
fn private_key_to_keypair(private_key: &str) -> Result<Keypair> {
    let bytes = bs58::decode(private_key)
        .into_vec()
        .map_err(|e| Error::Derivation(format!("Invalid Solana private key: {}", e)))?;

    Keypair::from_bytes(&bytes)
        .map_err(|e| Error::Derivation(format!("Invalid Solana private key: {}", e)))
}

fn to_chain_transaction(entry: RpcConfirmedTransactionStatusWithSignature) -> ChainTransaction {
    let status = if entry.err.is_some() {
        TransactionStatus::Failed
    } else {
        match entry.confirmation_status {
            Some(TransactionConfirmationStatus::Processed) => TransactionStatus::Pending,
            _ => TransactionStatus::Confirmed,
        }
    };

    ChainTransaction {
        id: entry.signature,
        chain: Chain::Solana,
        from: None,
        to: None,
        amount: None,
        status,
        timestamp: entry.block_time,
        block: Some(entry.slot),
    }
}

/// Outcome of a signature status poll; `None` while the signature is unseen
fn settle(signature: &Signature, status: Option<TransactionResult<()>>) -> Option<Result<()>> {
    match status? {
        Ok(()) => Some(Ok(())),
        Err(e) => Some(Err(Error::BroadcastFailed(format!(
            "{} failed on chain: {}",
            signature, e
        )))),
    }
}

fn expired_error(signature: &Signature) -> Error {
    Error::BroadcastFailed(format!(
        "{} was not processed before its blockhash expired",
        signature
    ))
}

fn is_transport_error(error: &ClientError) -> bool {
    matches!(error.kind(), ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_))
}

fn read_error(error: ClientError) -> Error {
    Error::NetworkUnavailable(error.to_string())
}

/// Map a failed broadcast to the error taxonomy
fn submit_error(signature: &Signature, error: ClientError) -> Error {
    let message = error.to_string();

    if let ClientErrorKind::Reqwest(e) = error.kind() {
        // The request may have reached the node before timing out
        if e.is_timeout() {
            return Error::UnknownOutcome {
                id: signature.to_string(),
                reason: message,
            };
        }
    }
    if is_transport_error(&error) {
        return Error::NetworkUnavailable(message);
    }

    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("insufficient lamports") {
        Error::InsufficientFunds(message)
    } else {
        Error::BroadcastFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_wallet::crypto::keys::{Ed25519Deriver, KeyDeriver};
    use duet_wallet::crypto::mnemonic::{mnemonic_to_seed, parse_mnemonic};
    use duet_wallet::transaction::provider::SOLANA_DEVNET_RPC;
    use solana_sdk::transaction::TransactionError;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn unreachable_client() -> SolanaClient {
        SolanaClient::new(ProviderConfig::new("http://127.0.0.1:9")).unwrap()
    }

    fn entry(
        err: Option<TransactionError>,
        confirmation: Option<TransactionConfirmationStatus>,
    ) -> RpcConfirmedTransactionStatusWithSignature {
        RpcConfirmedTransactionStatusWithSignature {
            signature: Signature::default().to_string(),
            slot: 42,
            err,
            memo: None,
            block_time: Some(1_700_000_000),
            confirmation_status: confirmation,
        }
    }

    #[test]
    fn test_derived_key_round_trips_to_keypair() {
        let seed = mnemonic_to_seed(&parse_mnemonic(MNEMONIC).unwrap());
        let account = Ed25519Deriver.derive(seed.as_bytes(), 0).unwrap();

        let keypair = private_key_to_keypair(account.private_key()).unwrap();
        assert_eq!(keypair.pubkey().to_string(), account.address());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(private_key_to_keypair("0OIl"), Err(Error::Derivation(_))));
        let short = bs58::encode([1u8; 32]).into_string();
        assert!(matches!(private_key_to_keypair(&short), Err(Error::Derivation(_))));
    }

    #[test]
    fn test_signature_status_mapping() {
        let tx = to_chain_transaction(entry(None, Some(TransactionConfirmationStatus::Finalized)));
        assert_eq!(tx.status, TransactionStatus::Confirmed);
        assert_eq!(tx.block, Some(42));
        assert_eq!(tx.timestamp, Some(1_700_000_000));
        assert!(tx.from.is_none());

        let tx = to_chain_transaction(entry(None, Some(TransactionConfirmationStatus::Processed)));
        assert_eq!(tx.status, TransactionStatus::Pending);

        let tx = to_chain_transaction(entry(Some(TransactionError::AccountNotFound), None));
        assert_eq!(tx.status, TransactionStatus::Failed);
    }

    #[test]
    fn test_status_poll_outcomes() {
        let signature = Signature::default();

        assert!(settle(&signature, None).is_none());
        assert!(matches!(settle(&signature, Some(Ok(()))), Some(Ok(()))));
        assert!(matches!(
            settle(&signature, Some(Err(TransactionError::InsufficientFundsForFee))),
            Some(Err(Error::BroadcastFailed(_)))
        ));
    }

    #[test]
    fn test_expired_blockhash_is_a_known_failure() {
        let error = expired_error(&Signature::default());
        assert!(matches!(error, Error::BroadcastFailed(_)));
        assert!(!error.is_unknown_outcome());
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            SolanaClient::new(ProviderConfig::new("api.devnet.solana.com")),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_transfer_rejects_bad_input_before_network() {
        let client = unreachable_client();
        let seed = mnemonic_to_seed(&parse_mnemonic(MNEMONIC).unwrap());
        let account = Ed25519Deriver.derive(seed.as_bytes(), 0).unwrap();

        let result = client
            .submit_transfer(account.private_key(), "not-base58-!!", Decimal::ONE)
            .await;
        assert!(matches!(result, Err(Error::InvalidRecipient(_))));

        let recipient = "vines1vzrYbzLMRdu58ou5XTby4qAqVRLmqo36NKPTg";
        let result = client
            .submit_transfer(account.private_key(), recipient, Decimal::ZERO)
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_network_error() {
        let result = unreachable_client()
            .fetch_balance("vines1vzrYbzLMRdu58ou5XTby4qAqVRLmqo36NKPTg")
            .await;
        assert!(matches!(result, Err(Error::NetworkUnavailable(_))));

        let result = unreachable_client().fetch_balance("not-an-address").await;
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_devnet_reads() {
        if std::env::var("RUN_NETWORK_TESTS").is_err() {
            return;
        }

        let client = SolanaClient::new(ProviderConfig::new(SOLANA_DEVNET_RPC)).unwrap();
        let address = "vines1vzrYbzLMRdu58ou5XTby4qAqVRLmqo36NKPTg";

        assert!(client.fetch_balance(address).await.unwrap() >= Decimal::ZERO);
        assert!(client.fetch_recent_transactions(address, 5).await.unwrap().len() <= 5);
    }
}
