//! Key material and signatures.
//!
//! Keys are curve-agnostic byte strings here; `dagnet-crypto` knows how to
//! interpret them for the curve a network selected at genesis.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::network::CurveId;

/// A marshalled public key.
///
/// SEC1 compressed point for the NIST curves, the 32-byte point for Ed25519.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(pub Vec<u8>);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0))
    }
}

/// A private scalar or seed.
///
/// Does not implement `Debug`, `Clone` or `Serialize`; bytes are zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(pub Vec<u8>);

impl PrivateKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A key pair for one curve.
///
/// Built by `dagnet_crypto::generate_keypair` or `dagnet_crypto::keypair_from_seed`.
pub struct KeyPair {
    pub curve: CurveId,
    pub public: PublicKey,
    pub private: PrivateKey,
}

/// A signature bound to one transaction digest.
///
/// For ECDSA `r` and `s` are the fixed-width scalars of the curve. For Ed25519
/// `r || s` is the 64-byte signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    pub curve: CurveId,
    pub digest: [u8; 32],
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

impl Signature {
    /// `r || s`.
    pub fn to_rs_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.r.len() + self.s.len());
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
        out
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("curve", &self.curve)
            .field("digest", &hex::encode(&self.digest[..4]))
            .finish_non_exhaustive()
    }
}
