//! LMDB environment setup.

use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions};

use dagnet_store::{DagStore, StoreError, StoreMeta};
use dagnet_transactions::Transaction;

use crate::snapshot::LmdbSnapshot;
use crate::write_batch::WriteBatch;
use crate::LmdbError;

const MAX_DBS: u32 = 8;

/// Default map size: 4 GiB of address space, grown lazily by the OS.
pub const DEFAULT_MAP_SIZE: usize = 4 * 1024 * 1024 * 1024;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    path: PathBuf,
    pub(crate) txs_db: Database<Bytes, Bytes>,
    pub(crate) children_db: Database<Bytes, Bytes>,
    pub(crate) by_sender_db: Database<Bytes, Bytes>,
    pub(crate) by_recipient_db: Database<Bytes, Bytes>,
    pub(crate) tips_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// `<data_dir>/db/<identifier>.db`
    pub fn db_path(data_dir: &Path, identifier: &str) -> PathBuf {
        data_dir.join("db").join(format!("{identifier}.db"))
    }

    /// Open or create the store for `identifier` under `data_dir`.
    pub fn open_in(data_dir: &Path, identifier: &str, map_size: usize) -> Result<Self, LmdbError> {
        Self::open(&Self::db_path(data_dir, identifier), map_size)
    }

    /// Open or create a single-file LMDB environment at `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // SAFETY: the environment file is only ever opened through this
        // constructor, once per process per path, and is never truncated or
        // modified by anything other than LMDB itself while mapped.
        let env = unsafe {
            let mut options = EnvOpenOptions::new();
            options
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .flags(EnvFlags::NO_SUB_DIR);
            options.open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let txs_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("txs"))?;
        let children_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("children"))?;
        let by_sender_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("by_sender"))?;
        let by_recipient_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("by_recipient"))?;
        let tips_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("tips"))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), "opened LMDB environment");

        Ok(Self {
            env,
            path: path.to_path_buf(),
            txs_db,
            children_db,
            by_sender_db,
            by_recipient_db,
            tips_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begin a write batch. Dropping it without committing aborts it.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        WriteBatch::new(self)
    }
}

impl DagStore for LmdbEnvironment {
    type Snapshot<'a> = LmdbSnapshot<'a>;

    fn snapshot(&self) -> Result<LmdbSnapshot<'_>, StoreError> {
        LmdbSnapshot::new(self)
    }

    fn put(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        batch.put_transaction(tx)?;
        batch.commit()
    }

    fn initialize(&self, meta: &StoreMeta, genesis: &[Transaction]) -> Result<(), StoreError> {
        let mut batch = self.write_batch()?;
        if batch.has_meta()? {
            return Err(StoreError::AlreadyInitialized);
        }
        for tx in genesis {
            batch.put_transaction(tx)?;
        }
        batch.put_meta(meta)?;
        batch.commit()
    }
}
