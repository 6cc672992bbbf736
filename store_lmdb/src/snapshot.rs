//! Read snapshots backed by an LMDB read transaction.
//!
//! A snapshot sees exactly the commits that finished before it was opened.
//! It pins a reader slot for its whole lifetime, so callers should keep
//! snapshots short-lived and must not hold one across a write on the same
//! thread.

use std::collections::BTreeSet;

use heed::RoTxn;

use dagnet_store::{DagSnapshot, StoreError, StoreMeta};
use dagnet_transactions::Transaction;
use dagnet_types::{Address, TxHash};

use crate::environment::LmdbEnvironment;
use crate::keys::{hash_from, nonce_from_sender_key};
use crate::LmdbError;

pub struct LmdbSnapshot<'a> {
    txn: RoTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> LmdbSnapshot<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().read_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }

    /// Raw wire bytes of a stored transaction.
    pub fn get_raw(&self, hash: &TxHash) -> Result<Option<Vec<u8>>, StoreError> {
        let bytes = self
            .env
            .txs_db
            .get(&self.txn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(bytes.map(|b| b.to_vec()))
    }
}

fn decode(bytes: &[u8]) -> Result<Transaction, StoreError> {
    Transaction::decode(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl DagSnapshot for LmdbSnapshot<'_> {
    fn get_transaction(&self, hash: &TxHash) -> Result<Option<Transaction>, StoreError> {
        match self
            .env
            .txs_db
            .get(&self.txn, hash.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, hash: &TxHash) -> Result<bool, StoreError> {
        Ok(self
            .env
            .txs_db
            .get(&self.txn, hash.as_bytes())
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn children(&self, hash: &TxHash) -> Result<Vec<TxHash>, StoreError> {
        let iter = self
            .env
            .children_db
            .prefix_iter(&self.txn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(LmdbError::from)?;
            out.push(hash_from(key.get(32..).unwrap_or_default())?);
        }
        Ok(out)
    }

    fn by_sender(&self, address: &Address) -> Result<Vec<TxHash>, StoreError> {
        let iter = self
            .env
            .by_sender_db
            .prefix_iter(&self.txn, address.as_bytes())
            .map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for result in iter {
            let (_, val) = result.map_err(LmdbError::from)?;
            out.push(hash_from(val)?);
        }
        Ok(out)
    }

    fn by_recipient(&self, address: &Address) -> Result<Vec<TxHash>, StoreError> {
        let iter = self
            .env
            .by_recipient_db
            .prefix_iter(&self.txn, address.as_bytes())
            .map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(LmdbError::from)?;
            out.push(hash_from(key.get(20..).unwrap_or_default())?);
        }
        Ok(out)
    }

    fn last_nonce(&self, address: &Address) -> Result<Option<u64>, StoreError> {
        let mut iter = self
            .env
            .by_sender_db
            .rev_prefix_iter(&self.txn, address.as_bytes())
            .map_err(LmdbError::from)?;
        match iter.next() {
            Some(result) => {
                let (key, _) = result.map_err(LmdbError::from)?;
                Ok(Some(nonce_from_sender_key(key)?))
            }
            None => Ok(None),
        }
    }

    fn tips(&self) -> Result<BTreeSet<TxHash>, StoreError> {
        let iter = self.env.tips_db.iter(&self.txn).map_err(LmdbError::from)?;
        let mut out = BTreeSet::new();
        for result in iter {
            let (key, _) = result.map_err(LmdbError::from)?;
            out.insert(hash_from(key)?);
        }
        Ok(out)
    }

    fn is_tip(&self, hash: &TxHash) -> Result<bool, StoreError> {
        Ok(self
            .env
            .tips_db
            .get(&self.txn, hash.as_bytes())
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        Ok(self.env.txs_db.len(&self.txn).map_err(LmdbError::from)?)
    }

    fn iter_hashes(&self) -> Result<Vec<TxHash>, StoreError> {
        let iter = self.env.txs_db.iter(&self.txn).map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(LmdbError::from)?;
            out.push(hash_from(key)?);
        }
        Ok(out)
    }

    fn meta(&self) -> Result<Option<StoreMeta>, StoreError> {
        Ok(crate::meta::read_meta(&self.env.meta_db, &self.txn)?)
    }
}
