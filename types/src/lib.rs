//! Fundamental types for the dagnet DAG ledger.
//!
//! This crate defines the values shared by every other crate in the workspace:
//! addresses, transaction hashes, arbitrary-precision amounts, timestamps and
//! clocks, key material, and the network configuration fixed at genesis.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod keys;
pub mod network;
pub mod time;

pub use address::Address;
pub use amount::Amount;
pub use error::TypesError;
pub use hash::TxHash;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::{CurveId, HashId, NetworkConfig, PeerId, DEFAULT_CONFIRMATION_DEPTH};
pub use time::{Clock, SystemClock, Timestamp};
