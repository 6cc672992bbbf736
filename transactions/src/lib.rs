//! The dagnet transaction model.
//!
//! A [`Transaction`] spends from `sender` to `recipient` and references one or
//! more parent transactions by hash. Its `hash` is the network hash of the
//! canonical encoding (everything except the signature, the sender's public
//! key and the hash itself), and signing binds that hash without changing it.

pub mod encoding;
pub mod error;
pub mod signer;
pub mod validation;

pub use error::TransactionError;
pub use signer::{AccountStore, KeyPairSigner, Signer};
pub use validation::check_well_formed;

use dagnet_types::{Address, Amount, HashId, PublicKey, Signature, Timestamp, TxHash};

/// Upper bound on `parents.len()` for non-genesis transactions.
pub const MAX_PARENTS: usize = 8;

/// Upper bound on `payload.len()`.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Per-sender counter; the first spend by an address has nonce 0.
    pub nonce: u64,
    pub sender: Address,
    pub recipient: Address,
    pub value: Amount,
    /// Order is significant and part of the hash.
    pub parents: Vec<TxHash>,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub payload: Vec<u8>,
    pub timestamp: Timestamp,
    /// Key that produced `signature`. Travels on the wire, excluded from the hash.
    pub sender_public_key: Option<PublicKey>,
    pub signature: Option<Signature>,
    pub hash: TxHash,
}

impl Transaction {
    /// A genesis transaction has no sender and no parents.
    pub fn is_genesis(&self) -> bool {
        self.sender.is_zero() && self.parents.is_empty()
    }

    /// Total debited from `sender`: `value + gas_limit * gas_price`.
    pub fn cost(&self) -> Amount {
        Amount::spend_cost(&self.value, self.gas_limit, self.gas_price)
    }

    pub fn canonical_encoding(&self) -> Vec<u8> {
        encoding::encode_canonical(self)
    }

    /// Hash of the canonical encoding under `hash_id`.
    pub fn compute_hash(&self, hash_id: HashId) -> TxHash {
        dagnet_crypto::hash_transaction(hash_id, &self.canonical_encoding())
    }

    /// Fill in `hash` from the current field values.
    pub fn seal(&mut self, hash_id: HashId) {
        self.hash = self.compute_hash(hash_id);
    }

    /// Bind a signature over `hash`.
    ///
    /// Records the signer's public key alongside the signature. The hash is
    /// left untouched.
    pub fn sign(&mut self, signer: &dyn Signer) -> Result<(), TransactionError> {
        if self.signature.is_some() {
            return Err(TransactionError::AlreadySigned);
        }
        if self.hash.is_zero() {
            return Err(TransactionError::NilHash);
        }
        let signature = signer.sign_digest(self.hash.as_bytes())?;
        self.sender_public_key = Some(signer.public_key());
        self.signature = Some(signature);
        Ok(())
    }

    /// Wire (and storage) form: canonical encoding plus signature, public
    /// key and claimed hash.
    pub fn encode(&self) -> Vec<u8> {
        encoding::encode_wire(self)
    }

    /// Strict decode of the wire form. The claimed hash is returned as-is;
    /// [`check_well_formed`] recomputes it.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        encoding::decode_wire(bytes)
    }
}
