//! Signing capability handed to transaction builders.
//!
//! Private keys stay behind this trait; code that creates transactions only
//! ever sees a `&dyn Signer`.

use std::sync::Arc;

use dagnet_crypto::CryptoError;
use dagnet_types::{Address, CurveId, HashId, KeyPair, PublicKey, Signature};

pub trait Signer: Send + Sync {
    fn curve(&self) -> CurveId;
    fn public_key(&self) -> PublicKey;
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, CryptoError>;

    /// Address this signer spends from on a network using `hash_id`.
    fn address(&self, hash_id: HashId) -> Address {
        dagnet_crypto::address_of(hash_id, &self.public_key())
    }
}

/// A [`Signer`] backed by an in-memory key pair.
pub struct KeyPairSigner {
    keypair: KeyPair,
}

impl KeyPairSigner {
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    pub fn from_seed(curve: CurveId, seed: &[u8; 32]) -> Result<Self, CryptoError> {
        Ok(Self::new(dagnet_crypto::keypair_from_seed(curve, seed)?))
    }

    pub fn generate(curve: CurveId) -> Result<Self, CryptoError> {
        Ok(Self::new(dagnet_crypto::generate_keypair(curve)?))
    }
}

impl Signer for KeyPairSigner {
    fn curve(&self) -> CurveId {
        self.keypair.curve
    }

    fn public_key(&self) -> PublicKey {
        self.keypair.public.clone()
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, CryptoError> {
        dagnet_crypto::sign_digest(self.keypair.curve, &self.keypair.private, digest)
    }
}

/// Source of signing capabilities for locally held accounts.
///
/// Key storage lives outside the core; the node only ever receives a
/// [`Signer`] for an address it has been asked to spend from.
pub trait AccountStore: Send + Sync {
    fn signer(&self, address: &Address) -> Option<Arc<dyn Signer>>;
}
