//! Wallet orchestration
//!
//! `WalletService` ties the seed, the per-chain derivers, the account
//! registry and the chain clients together into the operations a wallet
//! front end needs: create accounts, refresh balances and history, and send
//! native transfers.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::account::{addresses_match, is_valid_address, AccountRegistry};
use crate::config::RefreshConfig;
use crate::crypto::keys::{deriver_for, Account, Chain};
use crate::crypto::mnemonic::{Mnemonic, SeedProvider};
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;
use crate::transaction::{ChainClient, ChainTransaction, TransactionId};

/// Result of creating an account: the account itself plus its first balance
/// lookup, which may fail without undoing the creation
#[derive(Debug)]
pub struct AccountCreated {
    pub account: Account,
    pub balance: Result<Decimal>,
}

/// Which part of an account refresh failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStage {
    Balance,
    History,
}

/// A per-account failure isolated during a refresh
#[derive(Debug)]
pub struct RefreshFailure {
    pub address: String,
    pub stage: RefreshStage,
    pub error: Error,
}

/// Balances and history of every account of one chain
#[derive(Debug)]
pub struct ChainSnapshot {
    pub chain: Chain,
    /// Balance by address
    pub balances: HashMap<String, Decimal>,
    /// Recent transactions by address, most recent first
    pub transactions: HashMap<String, Vec<ChainTransaction>>,
    /// Accounts whose balance or history could not be fetched
    pub failures: Vec<RefreshFailure>,
    history_cap: usize,
}

impl ChainSnapshot {
    fn new(chain: Chain, history_cap: usize) -> Self {
        Self {
            chain,
            balances: HashMap::new(),
            transactions: HashMap::new(),
            failures: Vec::new(),
            history_cap,
        }
    }

    /// Record one account's results. Keyed by address, so the order in
    /// which accounts complete does not matter.
    fn merge(
        &mut self,
        address: String,
        balance: Result<Decimal>,
        history: Result<Vec<ChainTransaction>>,
    ) {
        match balance {
            Ok(balance) => {
                self.balances.insert(address.clone(), balance);
            }
            Err(error) => {
                warn!(chain = %self.chain, %address, %error, "balance refresh failed");
                self.failures.push(RefreshFailure {
                    address: address.clone(),
                    stage: RefreshStage::Balance,
                    error,
                });
            }
        }

        match history {
            Ok(history) => {
                self.transactions.insert(address, history);
            }
            Err(error) => {
                warn!(chain = %self.chain, %address, %error, "history refresh failed");
                self.failures.push(RefreshFailure {
                    address,
                    stage: RefreshStage::History,
                    error,
                });
            }
        }
    }

    /// Whether every account refreshed cleanly
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Sum of the fetched balances
    pub fn total_balance(&self) -> Decimal {
        self.balances.values().copied().sum()
    }

    /// All accounts' history merged newest first, without duplicates, capped.
    ///
    /// A transfer between two of our own accounts shows up in both histories
    /// and is listed once.
    pub fn recent_activity(&self) -> Vec<ChainTransaction> {
        let mut seen = HashSet::new();
        let mut merged: Vec<ChainTransaction> = self
            .transactions
            .values()
            .flatten()
            .filter(|tx| seen.insert(tx.id.clone()))
            .cloned()
            .collect();

        merged.sort_by_key(|tx| Reverse((tx.timestamp, tx.block)));
        merged.truncate(self.history_cap);
        merged
    }
}

/// Multi-chain wallet service
pub struct WalletService {
    seeds: SeedProvider,
    registry: AccountRegistry,
    clients: HashMap<Chain, Arc<dyn ChainClient>>,
    refresh: RefreshConfig,
}

impl WalletService {
    /// Create a new wallet service over `store` with no chain clients
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            seeds: SeedProvider::new(store.clone()),
            registry: AccountRegistry::new(store),
            clients: HashMap::new(),
            refresh: RefreshConfig::default(),
        }
    }

    /// Register the client of its chain, replacing any previous one
    pub fn with_client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.clients.insert(client.chain(), client);
        self
    }

    pub fn with_refresh_config(mut self, refresh: RefreshConfig) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn seeds(&self) -> &SeedProvider {
        &self.seeds
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    fn client(&self, chain: Chain) -> Result<&Arc<dyn ChainClient>> {
        self.clients
            .get(&chain)
            .ok_or_else(|| Error::NotSupported(format!("No {} client configured", chain)))
    }

    /// Return the current mnemonic, generating one on first use
    pub fn ensure_mnemonic(&self) -> Result<Mnemonic> {
        self.seeds.ensure_mnemonic()
    }

    /// Replace the mnemonic with `phrase`
    pub fn import_mnemonic(&self, phrase: &str) -> Result<Mnemonic> {
        self.seeds.import_mnemonic(phrase)
    }

    /// Create the next account of `chain`, generating a mnemonic if none
    /// exists yet, and look up its balance
    pub async fn create_account(&self, chain: Chain) -> Result<AccountCreated> {
        let mnemonic = self.seeds.ensure_mnemonic()?;
        let seed = SeedProvider::seed_of(&mnemonic);
        let account = self.registry.add_account(deriver_for(chain), &seed)?;

        let balance = match self.client(chain) {
            Ok(client) => client.fetch_balance(account.address()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &balance {
            warn!(
                %chain, address = %account.address(), error = %e,
                "initial balance lookup failed"
            );
        }

        Ok(AccountCreated { account, balance })
    }

    /// Derive and store the next account of `chain` from the existing mnemonic
    pub fn add_account(&self, chain: Chain) -> Result<Account> {
        let seed = self.seeds.current_seed()?;
        self.registry.add_account(deriver_for(chain), &seed)
    }

    /// Re-derive the accounts among the first `count` indices of `chain`
    /// that were never issued, returning them
    pub fn restore_accounts(&self, chain: Chain, count: u32) -> Result<Vec<Account>> {
        let seed = self.seeds.current_seed()?;
        self.registry.restore_accounts(deriver_for(chain), &seed, count)
    }

    pub fn list_accounts(&self, chain: Chain) -> Result<Vec<Account>> {
        self.registry.list_accounts(chain)
    }

    /// Remove the account with `address`; returns whether it existed
    pub fn remove_account(&self, chain: Chain, address: &str) -> Result<bool> {
        self.registry.remove_account(chain, address)
    }

    /// Fetch balance and history of every account of `chain`.
    ///
    /// Accounts are fetched concurrently up to the configured bound. A failing
    /// account is recorded in the snapshot and never aborts its siblings.
    pub async fn refresh(&self, chain: Chain) -> Result<ChainSnapshot> {
        let client = self.client(chain)?.clone();
        let accounts = self.registry.list_accounts(chain)?;
        let tx_limit = self.refresh.tx_limit;

        debug!(
            %chain,
            accounts = accounts.len(),
            concurrency = self.refresh.concurrency,
            "refreshing chain"
        );

        let mut results = stream::iter(accounts)
            .map(|account| {
                let client = client.clone();
                async move {
                    let address = account.address().to_string();
                    let (balance, history) = tokio::join!(
                        client.fetch_balance(&address),
                        client.fetch_recent_transactions(&address, tx_limit),
                    );
                    (address, balance, history)
                }
            })
            .buffer_unordered(self.refresh.concurrency.max(1));

        let mut snapshot = ChainSnapshot::new(chain, self.refresh.history_cap);
        while let Some((address, balance, history)) = results.next().await {
            snapshot.merge(address, balance, history);
        }

        info!(
            %chain,
            balances = snapshot.balances.len(),
            failures = snapshot.failures.len(),
            "chain refreshed"
        );
        Ok(snapshot)
    }

    /// Send `amount` of the native asset from our account `from` to `to`
    /// and wait for confirmation
    pub async fn send_transfer(
        &self,
        chain: Chain,
        from: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TransactionId> {
        let client = self.client(chain)?;

        let account = self
            .registry
            .find_account(chain, from)?
            .ok_or_else(|| Error::UnknownAccount(from.to_string()))?;

        if !is_valid_address(chain, to) {
            return Err(Error::InvalidRecipient(to.to_string()));
        }
        if addresses_match(chain, account.address(), to) {
            return Err(Error::InvalidRecipient(format!("{} is the sending account", to)));
        }
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!("amount must be positive, got {}", amount)));
        }

        info!(%chain, from = %account.address(), to, %amount, "submitting transfer");
        match client.submit_transfer(account.private_key(), to, amount).await {
            Ok(id) => {
                info!(%chain, tx = %id, "transfer confirmed");
                Ok(id)
            }
            Err(e) => {
                if e.is_unknown_outcome() {
                    warn!(
                        %chain, error = %e,
                        "transfer outcome unknown; check the chain before retrying"
                    );
                } else {
                    warn!(%chain, error = %e, "transfer failed");
                }
                Err(e)
            }
        }
    }
}
