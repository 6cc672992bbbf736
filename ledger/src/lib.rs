//! The dagnet ledger engine.
//!
//! Transactions form a DAG: each one names up to eight parents, and the
//! leaves are the tips. This crate decides what may be admitted
//! ([`Validator`]), what an address owns ([`balance`]), how a network is
//! seeded ([`genesis`]) and answers read queries ([`DagQuery`]). It works
//! against any [`dagnet_store::DagStore`] and never writes except through
//! genesis.

pub mod arena;
pub mod balance;
pub mod deadline;
pub mod error;
pub mod genesis;
pub mod query;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use arena::DagArena;
pub use balance::{balance_at, balance_of};
pub use deadline::Deadline;
pub use error::{ErrorKind, LedgerError};
pub use genesis::{build_genesis, genesis_fingerprint, genesis_meta, initialize_genesis};
pub use query::{descendant_count, DagQuery};
pub use validator::{
    AdmissionCheck, ValidationContext, Validator, ValidatorConfig, DEFAULT_MAX_FUTURE_DRIFT,
};
