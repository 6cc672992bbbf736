//! LMDB storage backend for the dagnet DAG ledger.
//!
//! Implements the `dagnet-store` traits with the `heed` LMDB bindings. The
//! whole DAG lives in one single-file environment at
//! `<data_dir>/db/<identifier>.db` holding six databases: `txs`, `children`,
//! `by_sender`, `by_recipient`, `tips` and `meta`.

pub mod environment;
pub mod error;
pub mod integrity;
mod keys;
mod meta;
pub mod migration;
pub mod snapshot;
pub mod write_batch;

pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use integrity::{check_integrity, IntegrityReport};
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use snapshot::LmdbSnapshot;
pub use write_batch::WriteBatch;
