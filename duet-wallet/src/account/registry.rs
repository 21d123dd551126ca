//! Per-chain registry of derived accounts

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use super::address::addresses_match;
use crate::crypto::keys::{Account, Chain, KeyDeriver};
use crate::crypto::mnemonic::Seed;
use crate::error::{Error, Result};
use crate::storage::{accounts_key, next_index_key, KeyValueStore};

/// Ordered account lists plus a never-reused next-index counter, per chain.
///
/// Mutations of one chain are serialized; different chains never block
/// each other.
pub struct AccountRegistry {
    store: Arc<dyn KeyValueStore>,
    ethereum_lock: Mutex<()>,
    solana_lock: Mutex<()>,
}

impl AccountRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ethereum_lock: Mutex::new(()),
            solana_lock: Mutex::new(()),
        }
    }

    fn lock(&self, chain: Chain) -> Result<MutexGuard<'_, ()>> {
        let lock = match chain {
            Chain::Ethereum => &self.ethereum_lock,
            Chain::Solana => &self.solana_lock,
        };
        lock.lock()
            .map_err(|_| Error::Storage(format!("{} registry lock poisoned", chain)))
    }

    /// Accounts of `chain` in insertion order, oldest first
    pub fn list_accounts(&self, chain: Chain) -> Result<Vec<Account>> {
        let Some(raw) = self.store.get(&accounts_key(chain))? else {
            return Ok(Vec::new());
        };

        let accounts: Vec<Account> = serde_json::from_str(&raw)
            .map_err(|e| Error::Serialization(format!("Corrupt {} account list: {}", chain, e)))?;

        if let Some(foreign) = accounts.iter().find(|account| account.chain() != chain) {
            return Err(Error::Serialization(format!(
                "{} account {} stored in the {} list",
                foreign.chain(),
                foreign.address(),
                chain
            )));
        }

        Ok(accounts)
    }

    /// Look up an account of `chain` by address
    pub fn find_account(&self, chain: Chain, address: &str) -> Result<Option<Account>> {
        Ok(self
            .list_accounts(chain)?
            .into_iter()
            .find(|account| addresses_match(chain, account.address(), address)))
    }

    /// The persisted next-index counter, if present and readable
    pub fn next_index(&self, chain: Chain) -> Result<Option<u32>> {
        let Some(raw) = self.store.get(&next_index_key(chain))? else {
            return Ok(None);
        };

        match raw.trim().parse::<u32>() {
            Ok(index) => Ok(Some(index)),
            Err(_) => {
                warn!(%chain, value = %raw, "ignoring unreadable next-index counter");
                Ok(None)
            }
        }
    }

    /// Derive the account at the next unused index and append it.
    ///
    /// The counter is written before the list, so a failure between the two
    /// writes skips an index instead of handing it out twice.
    pub fn add_account(&self, deriver: &dyn KeyDeriver, seed: &Seed) -> Result<Account> {
        let chain = deriver.chain();
        let _guard = self.lock(chain)?;

        let mut accounts = self.list_accounts(chain)?;
        let index = allocate_index(self.next_index(chain)?, &accounts);

        let account = deriver.derive(seed.as_bytes(), index)?;

        self.store.set(&next_index_key(chain), &index.saturating_add(1).to_string())?;
        accounts.push(account.clone());
        self.save(chain, &accounts)?;

        info!(%chain, index, address = %account.address(), "account added");
        Ok(account)
    }

    /// Re-derive the indices in `0..count` that this chain has never issued.
    ///
    /// Used after importing a mnemonic that was in use elsewhere. Indices
    /// below the counter (or below any stored account) are skipped since they
    /// were handed out before, possibly under another mnemonic. Fails with
    /// `NotSupported` when the whole range was already issued.
    pub fn restore_accounts(
        &self,
        deriver: &dyn KeyDeriver,
        seed: &Seed,
        count: u32,
    ) -> Result<Vec<Account>> {
        let chain = deriver.chain();
        let _guard = self.lock(chain)?;

        let mut accounts = self.list_accounts(chain)?;
        let first = allocate_index(self.next_index(chain)?, &accounts);
        if count == 0 {
            return Ok(Vec::new());
        }
        if first >= count {
            return Err(Error::NotSupported(format!(
                "{} indices 0..{} were already issued; the next free index is {}",
                chain, count, first
            )));
        }

        let restored = (first..count)
            .map(|index| deriver.derive(seed.as_bytes(), index))
            .collect::<Result<Vec<_>>>()?;

        self.store.set(&next_index_key(chain), &count.to_string())?;
        accounts.extend(restored.iter().cloned());
        self.save(chain, &accounts)?;

        info!(
            %chain,
            first_index = first,
            restored = restored.len(),
            next_index = count,
            "accounts restored"
        );
        Ok(restored)
    }

    /// Remove the account with `public_key`. The counter is left untouched.
    ///
    /// Returns whether an account was removed.
    pub fn remove_account(&self, chain: Chain, public_key: &str) -> Result<bool> {
        let _guard = self.lock(chain)?;

        let mut accounts = self.list_accounts(chain)?;
        let before = accounts.len();
        accounts.retain(|account| !addresses_match(chain, account.address(), public_key));

        if accounts.len() == before {
            return Ok(false);
        }

        self.save(chain, &accounts)?;
        info!(%chain, address = %public_key, "account removed");
        Ok(true)
    }

    fn save(&self, chain: Chain, accounts: &[Account]) -> Result<()> {
        let raw = serde_json::to_string(accounts)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        self.store.set(&accounts_key(chain), &raw)
    }
}

/// `max(counter, max(existing) + 1)`, or 0 for an empty history
fn allocate_index(counter: Option<u32>, accounts: &[Account]) -> u32 {
    let after_existing = accounts
        .iter()
        .map(Account::index)
        .max()
        .map_or(0, |max| max.saturating_add(1));

    counter.map_or(after_existing, |counter| counter.max(after_existing))
}
