//! DAG storage traits.
//!
//! The store holds transactions keyed by hash plus four reverse indexes
//! (`children`, `by_sender`, `by_recipient`, `tips`). Readers work against
//! immutable snapshots; a single writer applies each transaction atomically.

use std::collections::BTreeSet;

use dagnet_transactions::Transaction;
use dagnet_types::{Address, TxHash};

use crate::meta::StoreMeta;
use crate::StoreError;

/// A consistent read view of the DAG at one point in the admission order.
pub trait DagSnapshot {
    fn get_transaction(&self, hash: &TxHash) -> Result<Option<Transaction>, StoreError>;

    fn contains(&self, hash: &TxHash) -> Result<bool, StoreError>;

    /// Hashes of stored transactions naming `hash` as a parent, in hash order.
    fn children(&self, hash: &TxHash) -> Result<Vec<TxHash>, StoreError>;

    /// Hashes of transactions spent by `address`, in nonce order.
    /// Genesis transactions are never indexed here.
    fn by_sender(&self, address: &Address) -> Result<Vec<TxHash>, StoreError>;

    /// Hashes of transactions paying `address`, in hash order.
    fn by_recipient(&self, address: &Address) -> Result<Vec<TxHash>, StoreError>;

    /// Nonce of the latest stored spend by `address`, if any.
    fn last_nonce(&self, address: &Address) -> Result<Option<u64>, StoreError>;

    /// Current leaves.
    fn tips(&self) -> Result<BTreeSet<TxHash>, StoreError>;

    fn is_tip(&self, hash: &TxHash) -> Result<bool, StoreError>;

    fn transaction_count(&self) -> Result<u64, StoreError>;

    /// Every stored hash, in hash order.
    fn iter_hashes(&self) -> Result<Vec<TxHash>, StoreError>;

    /// `None` for a fresh store.
    fn meta(&self) -> Result<Option<StoreMeta>, StoreError>;
}

/// A DAG store: many concurrent snapshots, one writer.
pub trait DagStore: Send + Sync {
    type Snapshot<'a>: DagSnapshot
    where
        Self: 'a;

    fn snapshot(&self) -> Result<Self::Snapshot<'_>, StoreError>;

    /// Append `tx` and update every index in one all-or-nothing commit.
    ///
    /// The caller has already validated `tx`; the store only refuses hashes
    /// it already holds.
    fn put(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Write the header and the genesis frontier in a single commit.
    ///
    /// Fails with [`StoreError::AlreadyInitialized`] if a header exists.
    fn initialize(&self, meta: &StoreMeta, genesis: &[Transaction]) -> Result<(), StoreError>;
}
