//! Nullable infrastructure for deterministic testing.
//!
//! Every outside dependency of the node (clock, peer transport, DAG storage,
//! key storage) sits behind a trait. This crate provides implementations that:
//! - return deterministic values
//! - can be steered programmatically
//! - never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod accounts;
pub mod clock;
pub mod store;
pub mod transport;

pub use accounts::NullAccountStore;
pub use clock::NullClock;
pub use store::{NullDagStore, NullSnapshot};
pub use transport::NullTransport;
