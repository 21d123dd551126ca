//! Common transaction types

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::keys::Chain;
use crate::error::{Error, Result};

/// Identifier of a submitted transaction (hash or signature)
pub type TransactionId = String;

/// Transaction status as reported by the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction is pending
    Pending,
    /// Transaction is confirmed
    Confirmed,
    /// Transaction failed
    Failed,
}

/// A transaction touching one of our addresses, as read from the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransaction {
    /// Transaction hash (Ethereum) or signature (Solana)
    pub id: TransactionId,
    pub chain: Chain,
    /// Sender, when the query exposes it
    pub from: Option<String>,
    /// Recipient, when the query exposes it
    pub to: Option<String>,
    /// Native amount in the display unit, when the query exposes it
    pub amount: Option<Decimal>,
    pub status: TransactionStatus,
    /// Unix timestamp in seconds
    pub timestamp: Option<i64>,
    /// Block number (Ethereum) or slot (Solana)
    pub block: Option<u64>,
}

/// Lifecycle of a native transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Constructed,
    Signed,
    Broadcast,
    Confirmed,
    Failed,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Whether `next` directly follows `self`
    pub fn can_advance_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Constructed, Signed)
                | (Constructed, Failed)
                | (Signed, Broadcast)
                | (Signed, Failed)
                | (Broadcast, Confirmed)
                | (Broadcast, Failed)
        )
    }

    /// Move to `next`, rejecting transitions that skip or revisit a state
    pub fn advance(&mut self, next: TransferState) -> Result<()> {
        if !self.can_advance_to(next) {
            return Err(Error::BroadcastFailed(format!(
                "illegal transfer transition {:?} -> {:?}",
                self, next
            )));
        }
        debug!(from = ?self, to = ?next, "transfer state advanced");
        *self = next;
        Ok(())
    }

    /// Record a failed step. An unknown outcome is neither confirmed nor
    /// failed, so it leaves the state where it is.
    pub fn record_failure(&mut self, error: &Error) -> Result<()> {
        if error.is_unknown_outcome() {
            debug!(state = ?self, "transfer outcome unknown");
            return Ok(());
        }
        self.advance(TransferState::Failed)
    }
}

/// Read and write access to one chain through its RPC endpoint
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The chain this client talks to
    fn chain(&self) -> Chain;

    /// Native balance of `address` in the display unit (ETH, SOL)
    async fn fetch_balance(&self, address: &str) -> Result<Decimal>;

    /// Up to `limit` recent transactions touching `address`, most recent first
    async fn fetch_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<ChainTransaction>>;

    /// Sign a native transfer locally, broadcast it and wait for confirmation.
    ///
    /// Never retried. An `UnknownOutcome` error means the transfer may still land.
    async fn submit_transfer(
        &self,
        private_key: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TransactionId>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransferState::*;

    #[test]
    fn test_transfer_happy_path() {
        let mut state = Constructed;
        for next in [Signed, Broadcast, Confirmed] {
            state.advance(next).unwrap();
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Confirmed, Failed] {
            for next in [Constructed, Signed, Broadcast, Confirmed, Failed] {
                assert!(!terminal.can_advance_to(next));
            }
        }
    }

    #[test]
    fn test_no_skipping_or_cancel_after_broadcast() {
        let mut state = Constructed;
        assert!(state.advance(Broadcast).is_err());
        assert_eq!(state, Constructed);

        state.advance(Signed).unwrap();
        state.advance(Broadcast).unwrap();
        assert!(!state.can_advance_to(Constructed));
        assert!(!state.can_advance_to(Signed));
    }

    #[test]
    fn test_unknown_outcome_is_not_a_failure() {
        let mut state = Constructed;
        state.advance(Signed).unwrap();
        state.advance(Broadcast).unwrap();

        let unknown = Error::UnknownOutcome {
            id: "0xabc".to_string(),
            reason: "not confirmed within 120s".to_string(),
        };
        state.record_failure(&unknown).unwrap();
        assert_eq!(state, Broadcast);

        state.record_failure(&Error::BroadcastFailed("reverted".to_string())).unwrap();
        assert_eq!(state, Failed);
    }
}
