//! Read-only queries over one snapshot.
//!
//! A [`DagQuery`] wraps a single snapshot, so every answer it gives within
//! one call reflects the same prefix of the admission order.

use std::collections::{BTreeSet, HashSet, VecDeque};

use num_bigint::BigInt;

use dagnet_store::DagSnapshot;
use dagnet_transactions::Transaction;
use dagnet_types::{Address, Amount, TxHash};

use crate::balance;
use crate::deadline::Deadline;
use crate::error::LedgerError;

/// Count distinct descendants of `hash`, stopping once `limit` is reached.
pub fn descendant_count<S: DagSnapshot>(
    snapshot: &S,
    hash: &TxHash,
    limit: u64,
    deadline: &Deadline,
) -> Result<u64, LedgerError> {
    let mut seen: HashSet<TxHash> = HashSet::new();
    let mut queue = VecDeque::from([*hash]);
    while let Some(h) = queue.pop_front() {
        if seen.len() as u64 >= limit {
            break;
        }
        deadline.check()?;
        for child in snapshot.children(&h)? {
            if seen.insert(child) {
                queue.push_back(child);
            }
        }
    }
    Ok((seen.len() as u64).min(limit))
}

pub struct DagQuery<S> {
    snapshot: S,
    confirmation_depth: u32,
}

impl<S: DagSnapshot> DagQuery<S> {
    pub fn new(snapshot: S, confirmation_depth: u32) -> Self {
        Self {
            snapshot,
            confirmation_depth,
        }
    }

    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    pub fn get_transaction(&self, hash: &TxHash) -> Result<Transaction, LedgerError> {
        self.snapshot
            .get_transaction(hash)?
            .ok_or(LedgerError::NotFound(*hash))
    }

    /// `NotFound` when `hash` itself is not stored.
    pub fn children_of(&self, hash: &TxHash) -> Result<BTreeSet<TxHash>, LedgerError> {
        if !self.snapshot.contains(hash)? {
            return Err(LedgerError::NotFound(*hash));
        }
        Ok(self.snapshot.children(hash)?.into_iter().collect())
    }

    /// Every transaction sent or received by `address`, oldest first
    /// (by timestamp, then hash).
    pub fn transactions_of_address(&self, address: &Address) -> Result<Vec<Transaction>, LedgerError> {
        let mut hashes: BTreeSet<TxHash> = self.snapshot.by_sender(address)?.into_iter().collect();
        hashes.extend(self.snapshot.by_recipient(address)?);
        let mut txs = hashes
            .iter()
            .map(|h| self.indexed(h))
            .collect::<Result<Vec<_>, _>>()?;
        txs.sort_by(|a, b| (a.timestamp, a.hash).cmp(&(b.timestamp, b.hash)));
        Ok(txs)
    }

    /// Spends by `address` in nonce order.
    pub fn transactions_by_sender(&self, address: &Address) -> Result<Vec<Transaction>, LedgerError> {
        self.snapshot
            .by_sender(address)?
            .iter()
            .map(|h| self.indexed(h))
            .collect()
    }

    pub fn tips(&self) -> Result<BTreeSet<TxHash>, LedgerError> {
        Ok(self.snapshot.tips()?)
    }

    pub fn transaction_count(&self) -> Result<u64, LedgerError> {
        Ok(self.snapshot.transaction_count()?)
    }

    /// The tip maximizing `(descendant count, timestamp, hash)`.
    ///
    /// Tips have no children, so in practice the later timestamp wins and
    /// the byte-greater hash breaks ties. Only the tips themselves are read.
    pub fn best_tip(&self, deadline: &Deadline) -> Result<TxHash, LedgerError> {
        let mut best: Option<(u64, u64, TxHash)> = None;
        for hash in self.snapshot.tips()? {
            deadline.check()?;
            let tx = self.snapshot.get_transaction(&hash)?.ok_or_else(|| {
                LedgerError::StoreCorruption(format!("tip {hash} is not stored"))
            })?;
            let descendants = descendant_count(&self.snapshot, &hash, u64::MAX, deadline)?;
            let key = (descendants, tx.timestamp.as_nanos(), hash);
            if best.as_ref().map_or(true, |b| key > *b) {
                best = Some(key);
            }
        }
        // An empty tip set only happens before genesis.
        best.map(|(_, _, h)| h).ok_or(LedgerError::NotFound(TxHash::ZERO))
    }

    pub fn balance_of(&self, address: &Address, deadline: &Deadline) -> Result<Amount, LedgerError> {
        balance::balance_of(&self.snapshot, address, deadline)
    }

    pub fn balance_at(
        &self,
        address: &Address,
        heads: &[TxHash],
        deadline: &Deadline,
    ) -> Result<BigInt, LedgerError> {
        balance::balance_at(&self.snapshot, address, heads, deadline)
    }

    /// Number of descendants of `hash`, capped at the confirmation depth.
    pub fn confirmation_depth_of(&self, hash: &TxHash, deadline: &Deadline) -> Result<u64, LedgerError> {
        if !self.snapshot.contains(hash)? {
            return Err(LedgerError::NotFound(*hash));
        }
        descendant_count(&self.snapshot, hash, u64::from(self.confirmation_depth), deadline)
    }

    pub fn is_finalized(&self, hash: &TxHash, deadline: &Deadline) -> Result<bool, LedgerError> {
        Ok(self.confirmation_depth_of(hash, deadline)? >= u64::from(self.confirmation_depth))
    }

    /// Nonce the next spend by `address` must carry.
    pub fn next_nonce(&self, address: &Address) -> Result<u64, LedgerError> {
        Ok(match self.snapshot.last_nonce(address)? {
            None => 0,
            Some(n) => n.saturating_add(1),
        })
    }

    fn indexed(&self, hash: &TxHash) -> Result<Transaction, LedgerError> {
        self.snapshot.get_transaction(hash)?.ok_or_else(|| {
            LedgerError::StoreCorruption(format!("index points at missing transaction {hash}"))
        })
    }
}
