//! Address derivation from public keys.

use dagnet_types::{Address, HashId, PublicKey};

use crate::hash::hash;

/// `hash(marshal(public_key))` truncated to its low (last) 20 bytes.
pub fn address_of(hash_id: HashId, public_key: &PublicKey) -> Address {
    let digest = hash(hash_id, public_key.as_bytes());
    let mut out = [0u8; Address::LEN];
    out.copy_from_slice(&digest[32 - Address::LEN..]);
    Address::new(out)
}
