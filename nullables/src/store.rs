//! Nullable DAG store: thread-safe in-memory storage for testing.
//!
//! Writers clone-on-write the whole state behind an `Arc`, so a snapshot
//! taken before a `put` keeps seeing the old state, the same isolation an
//! LMDB read transaction gives.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dagnet_store::{DagSnapshot, DagStore, StoreError, StoreMeta};
use dagnet_transactions::Transaction;
use dagnet_types::{Address, TxHash};

#[derive(Clone, Default)]
struct MemState {
    txs: BTreeMap<TxHash, Transaction>,
    children: BTreeMap<TxHash, BTreeSet<TxHash>>,
    by_sender: BTreeMap<Address, BTreeMap<u64, TxHash>>,
    by_recipient: BTreeMap<Address, BTreeSet<TxHash>>,
    tips: BTreeSet<TxHash>,
    meta: Option<StoreMeta>,
}

impl MemState {
    fn insert(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        if self.txs.contains_key(&tx.hash) {
            return Err(StoreError::Duplicate(tx.hash.to_string()));
        }
        for p in &tx.parents {
            self.children.entry(*p).or_default().insert(tx.hash);
            self.tips.remove(p);
        }
        if !tx.is_genesis() {
            self.by_sender.entry(tx.sender).or_default().insert(tx.nonce, tx.hash);
        }
        self.by_recipient.entry(tx.recipient).or_default().insert(tx.hash);
        self.tips.insert(tx.hash);
        self.txs.insert(tx.hash, tx.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct NullDagStore {
    state: RwLock<Arc<MemState>>,
    fail_next_put: AtomicBool,
}

impl NullDagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `put` fail with a backend error and leave the state
    /// untouched, as an aborted commit would.
    pub fn fail_next_put(&self) {
        self.fail_next_put.store(true, Ordering::SeqCst);
    }

    fn current(&self) -> Arc<MemState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply `f` to a private copy of the state and publish it only on success.
    fn write(&self, f: impl FnOnce(&mut MemState) -> Result<(), StoreError>) -> Result<(), StoreError> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = MemState::clone(&guard);
        f(&mut next)?;
        *guard = Arc::new(next);
        Ok(())
    }
}

/// A frozen view of a [`NullDagStore`].
#[derive(Clone)]
pub struct NullSnapshot {
    state: Arc<MemState>,
}

impl DagSnapshot for NullSnapshot {
    fn get_transaction(&self, hash: &TxHash) -> Result<Option<Transaction>, StoreError> {
        Ok(self.state.txs.get(hash).cloned())
    }

    fn contains(&self, hash: &TxHash) -> Result<bool, StoreError> {
        Ok(self.state.txs.contains_key(hash))
    }

    fn children(&self, hash: &TxHash) -> Result<Vec<TxHash>, StoreError> {
        Ok(self
            .state
            .children
            .get(hash)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default())
    }

    fn by_sender(&self, address: &Address) -> Result<Vec<TxHash>, StoreError> {
        Ok(self
            .state
            .by_sender
            .get(address)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default())
    }

    fn by_recipient(&self, address: &Address) -> Result<Vec<TxHash>, StoreError> {
        Ok(self
            .state
            .by_recipient
            .get(address)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default())
    }

    fn last_nonce(&self, address: &Address) -> Result<Option<u64>, StoreError> {
        Ok(self
            .state
            .by_sender
            .get(address)
            .and_then(|m| m.keys().next_back().copied()))
    }

    fn tips(&self) -> Result<BTreeSet<TxHash>, StoreError> {
        Ok(self.state.tips.clone())
    }

    fn is_tip(&self, hash: &TxHash) -> Result<bool, StoreError> {
        Ok(self.state.tips.contains(hash))
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        Ok(self.state.txs.len() as u64)
    }

    fn iter_hashes(&self) -> Result<Vec<TxHash>, StoreError> {
        Ok(self.state.txs.keys().copied().collect())
    }

    fn meta(&self) -> Result<Option<StoreMeta>, StoreError> {
        Ok(self.state.meta.clone())
    }
}

impl DagStore for NullDagStore {
    type Snapshot<'a> = NullSnapshot;

    fn snapshot(&self) -> Result<NullSnapshot, StoreError> {
        Ok(NullSnapshot {
            state: self.current(),
        })
    }

    fn put(&self, tx: &Transaction) -> Result<(), StoreError> {
        if self.fail_next_put.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        self.write(|s| s.insert(tx))
    }

    fn initialize(&self, meta: &StoreMeta, genesis: &[Transaction]) -> Result<(), StoreError> {
        self.write(|s| {
            if s.meta.is_some() {
                return Err(StoreError::AlreadyInitialized);
            }
            for tx in genesis {
                s.insert(tx)?;
            }
            s.meta = Some(meta.clone());
            Ok(())
        })
    }
}
