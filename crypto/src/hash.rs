//! 256-bit hashing, selectable per network.

use dagnet_types::{HashId, TxHash};
use sha3::{Digest, Sha3_256};

/// Hash arbitrary data with the network's hash function.
pub fn hash(hash_id: HashId, data: &[u8]) -> [u8; 32] {
    match hash_id {
        HashId::Sha3_256 => {
            let mut output = [0u8; 32];
            output.copy_from_slice(&Sha3_256::digest(data));
            output
        }
        HashId::Blake3 => *blake3::hash(data).as_bytes(),
    }
}

/// Hash a canonical transaction encoding to produce its `TxHash`.
pub fn hash_transaction(hash_id: HashId, canonical: &[u8]) -> TxHash {
    TxHash::new(hash(hash_id, canonical))
}
