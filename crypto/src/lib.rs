//! Cryptographic primitives for the dagnet DAG ledger.
//!
//! - **SHA3-256** (legacy networks) or **BLAKE3** (default) for transaction
//!   and address hashing, selected per network by [`HashId`](dagnet_types::HashId)
//! - Deterministic **ECDSA** (RFC 6979) over P-256 or P-521, or **Ed25519**,
//!   selected per network by [`CurveId`](dagnet_types::CurveId)
//! - Address derivation: the low 20 bytes of the hash of the marshalled public key

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::address_of;
pub use error::CryptoError;
pub use hash::{hash, hash_transaction};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private};
pub use sign::{sign_digest, verify_digest};
