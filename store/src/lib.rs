//! Abstract storage traits for the dagnet DAG ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod dag;
pub mod error;
pub mod meta;

pub use dag::{DagSnapshot, DagStore};
pub use error::StoreError;
pub use meta::StoreMeta;
