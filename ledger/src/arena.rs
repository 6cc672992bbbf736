//! In-memory arena for DAG traversals.
//!
//! Transactions pulled from a snapshot are stored once in a `Vec`, so a
//! walk over a past cone never reads the same hash from the store twice.

use std::collections::{HashMap, VecDeque};

use dagnet_store::DagSnapshot;
use dagnet_transactions::Transaction;
use dagnet_types::TxHash;

use crate::deadline::Deadline;
use crate::error::LedgerError;

/// The past cone of a set of heads, loaded once.
#[derive(Default)]
pub struct DagArena {
    nodes: Vec<Transaction>,
    index: HashMap<TxHash, usize>,
}

impl DagArena {
    /// Reverse breadth-first walk from `heads`, visiting every ancestor once.
    ///
    /// An unknown head is `NotFound`; an unknown ancestor means the store
    /// broke parent closure and is `StoreCorruption`.
    pub fn load_past_cone<S: DagSnapshot>(
        snapshot: &S,
        heads: impl IntoIterator<Item = TxHash>,
        deadline: &Deadline,
    ) -> Result<Self, LedgerError> {
        let mut arena = Self::default();
        let mut queue: VecDeque<(TxHash, bool)> = heads.into_iter().map(|h| (h, true)).collect();

        while let Some((hash, is_head)) = queue.pop_front() {
            if arena.index.contains_key(&hash) {
                continue;
            }
            deadline.check()?;
            let tx = match snapshot.get_transaction(&hash)? {
                Some(tx) => tx,
                None if is_head => return Err(LedgerError::NotFound(hash)),
                None => {
                    return Err(LedgerError::StoreCorruption(format!(
                        "ancestor {hash} is not stored"
                    )))
                }
            };
            for p in &tx.parents {
                if !arena.index.contains_key(p) {
                    queue.push_back((*p, false));
                }
            }
            arena.index.insert(hash, arena.nodes.len());
            arena.nodes.push(tx);
        }
        Ok(arena)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, hash: &TxHash) -> Option<usize> {
        self.index.get(hash).copied()
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.nodes.iter()
    }
}
