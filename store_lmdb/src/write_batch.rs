//! Write batching: groups every index update for a transaction into a single
//! LMDB write transaction.
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted),
//! so no index is ever partially updated.

use heed::RwTxn;

use dagnet_store::{StoreError, StoreMeta};
use dagnet_transactions::Transaction;

use crate::environment::LmdbEnvironment;
use crate::keys::{child_key, recipient_key, sender_key};
use crate::LmdbError;

const EMPTY: &[u8] = &[];

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }

    pub fn has_meta(&self) -> Result<bool, StoreError> {
        let count = self.env.meta_db.len(&self.txn).map_err(LmdbError::from)?;
        Ok(count > 0)
    }

    /// Store `tx` and maintain `children`, `by_sender`, `by_recipient` and
    /// `tips`.
    pub fn put_transaction(&mut self, tx: &Transaction) -> Result<(), StoreError> {
        let hash = tx.hash;
        if self
            .env
            .txs_db
            .get(&self.txn, hash.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(hash.to_string()));
        }

        self.env
            .txs_db
            .put(&mut self.txn, hash.as_bytes(), &tx.encode())
            .map_err(LmdbError::from)?;

        for parent in &tx.parents {
            self.env
                .children_db
                .put(&mut self.txn, &child_key(parent, &hash)[..], EMPTY)
                .map_err(LmdbError::from)?;
            self.env
                .tips_db
                .delete(&mut self.txn, parent.as_bytes())
                .map_err(LmdbError::from)?;
        }

        if !tx.is_genesis() {
            self.env
                .by_sender_db
                .put(
                    &mut self.txn,
                    &sender_key(&tx.sender, tx.nonce)[..],
                    hash.as_bytes(),
                )
                .map_err(LmdbError::from)?;
        }

        self.env
            .by_recipient_db
            .put(&mut self.txn, &recipient_key(&tx.recipient, &hash)[..], EMPTY)
            .map_err(LmdbError::from)?;

        self.env
            .tips_db
            .put(&mut self.txn, hash.as_bytes(), EMPTY)
            .map_err(LmdbError::from)?;

        Ok(())
    }

    pub fn put_meta(&mut self, meta: &StoreMeta) -> Result<(), StoreError> {
        crate::meta::write_meta(&self.env.meta_db, &mut self.txn, meta)?;
        Ok(())
    }

    /// Commit all operations atomically.
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagnet_store::{DagSnapshot, DagStore};
    use dagnet_types::{Address, Amount, CurveId, HashId, Timestamp, TxHash};
    use std::collections::BTreeSet;

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = LmdbEnvironment::open_in(dir.path(), "testnet", 64 * 1024 * 1024)
            .expect("open env");
        (dir, env)
    }

    fn genesis(recipient: u8, value: u64) -> Transaction {
        let mut tx = Transaction {
            nonce: 0,
            sender: Address::ZERO,
            recipient: Address::new([recipient; 20]),
            value: Amount::from(value),
            parents: vec![],
            gas_limit: 0,
            gas_price: 0,
            payload: b"testnet".to_vec(),
            timestamp: Timestamp::EPOCH,
            sender_public_key: None,
            signature: None,
            hash: TxHash::ZERO,
        };
        tx.seal(HashId::Blake3);
        tx
    }

    fn spend(sender: u8, nonce: u64, parents: Vec<TxHash>, ts: u64) -> Transaction {
        let mut tx = Transaction {
            nonce,
            sender: Address::new([sender; 20]),
            recipient: Address::new([9; 20]),
            value: Amount::from(1u64),
            parents,
            gas_limit: 0,
            gas_price: 0,
            payload: vec![],
            timestamp: Timestamp::from_nanos(ts),
            sender_public_key: None,
            signature: None,
            hash: TxHash::ZERO,
        };
        tx.seal(HashId::Blake3);
        tx
    }

    fn meta(genesis: TxHash) -> StoreMeta {
        StoreMeta {
            genesis,
            hash_id: HashId::Blake3,
            curve_id: CurveId::Ed25519,
            identifier: "testnet".into(),
            version: 1,
        }
    }

    #[test]
    fn put_updates_every_index() {
        let (_dir, env) = temp_env();
        let g = genesis(1, 100);
        env.initialize(&meta(g.hash), std::slice::from_ref(&g))
            .expect("initialize");

        let t = spend(1, 0, vec![g.hash], 5);
        env.put(&t).expect("put");

        let snap = env.snapshot().expect("snapshot");
        assert_eq!(snap.get_transaction(&t.hash).expect("get"), Some(t.clone()));
        assert_eq!(snap.children(&g.hash).expect("children"), vec![t.hash]);
        assert_eq!(snap.by_sender(&t.sender).expect("by_sender"), vec![t.hash]);
        assert_eq!(snap.by_recipient(&t.recipient).expect("by_recipient"), vec![t.hash]);
        assert_eq!(snap.tips().expect("tips"), BTreeSet::from([t.hash]));
        assert_eq!(snap.last_nonce(&t.sender).expect("nonce"), Some(0));
        assert_eq!(snap.transaction_count().expect("count"), 2);
    }

    #[test]
    fn genesis_is_not_sender_indexed() {
        let (_dir, env) = temp_env();
        let a = genesis(1, 100);
        let b = genesis(2, 0);
        env.initialize(&meta(b.hash), &[a.clone(), b.clone()])
            .expect("initialize");
        let snap = env.snapshot().expect("snapshot");
        assert!(snap.by_sender(&Address::ZERO).expect("by_sender").is_empty());
        assert_eq!(snap.tips().expect("tips"), BTreeSet::from([a.hash, b.hash]));
        assert_eq!(snap.meta().expect("meta"), Some(meta(b.hash)));
    }

    #[test]
    fn duplicate_put_rejected_without_side_effects() {
        let (_dir, env) = temp_env();
        let g = genesis(1, 100);
        env.initialize(&meta(g.hash), std::slice::from_ref(&g))
            .expect("initialize");
        let t = spend(1, 0, vec![g.hash], 5);
        env.put(&t).expect("put");
        assert!(matches!(env.put(&t), Err(StoreError::Duplicate(_))));
        let snap = env.snapshot().expect("snapshot");
        assert_eq!(snap.transaction_count().expect("count"), 2);
    }

    #[test]
    fn second_initialize_refused() {
        let (_dir, env) = temp_env();
        let g = genesis(1, 100);
        env.initialize(&meta(g.hash), std::slice::from_ref(&g))
            .expect("initialize");
        assert!(matches!(
            env.initialize(&meta(g.hash), &[]),
            Err(StoreError::AlreadyInitialized)
        ));
    }

    #[test]
    fn dropped_batch_rolls_back() {
        let (_dir, env) = temp_env();
        let g = genesis(1, 100);
        {
            let mut batch = env.write_batch().expect("write_batch");
            batch.put_transaction(&g).expect("put");
            // dropped without commit
        }
        let snap = env.snapshot().expect("snapshot");
        assert!(!snap.contains(&g.hash).expect("contains"));
        assert!(snap.tips().expect("tips").is_empty());
    }

    #[test]
    fn snapshot_does_not_see_later_commits() {
        let (_dir, env) = temp_env();
        let g = genesis(1, 100);
        env.initialize(&meta(g.hash), std::slice::from_ref(&g))
            .expect("initialize");
        let t = spend(1, 0, vec![g.hash], 5);

        let before = env.snapshot().expect("snapshot");
        let handle = std::thread::scope(|s| {
            s.spawn(|| env.put(&t)).join()
        });
        handle.expect("join").expect("put");

        assert!(!before.contains(&t.hash).expect("contains"));
        assert_eq!(before.tips().expect("tips"), BTreeSet::from([g.hash]));
        drop(before);

        let after = env.snapshot().expect("snapshot");
        assert!(after.contains(&t.hash).expect("contains"));
    }

    #[test]
    fn reopen_preserves_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let g = genesis(1, 100);
        let t = spend(1, 0, vec![g.hash], 5);
        {
            let env = LmdbEnvironment::open_in(dir.path(), "testnet", 64 * 1024 * 1024)
                .expect("open env");
            env.initialize(&meta(g.hash), std::slice::from_ref(&g))
                .expect("initialize");
            env.put(&t).expect("put");
        }
        let env = LmdbEnvironment::open_in(dir.path(), "testnet", 64 * 1024 * 1024)
            .expect("reopen env");
        let snap = env.snapshot().expect("snapshot");
        assert_eq!(snap.tips().expect("tips"), BTreeSet::from([t.hash]));
        assert_eq!(snap.children(&g.hash).expect("children"), vec![t.hash]);
        assert_eq!(snap.by_sender(&t.sender).expect("by_sender"), vec![t.hash]);
        assert_eq!(snap.meta().expect("meta"), Some(meta(g.hash)));
    }
}
