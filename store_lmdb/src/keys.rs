//! Composite binary keys for the index databases.
//!
//! Fixed-width prefixes let every index be scanned with `prefix_iter`, and
//! big-endian nonces sort numerically.

use dagnet_types::{Address, TxHash};

use crate::LmdbError;

/// `children`: `parent(32) ++ child(32)` → empty.
pub(crate) fn child_key(parent: &TxHash, child: &TxHash) -> [u8; 64] {
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(parent.as_bytes());
    key[32..].copy_from_slice(child.as_bytes());
    key
}

/// `by_sender`: `sender(20) ++ nonce_be(8)` → hash.
pub(crate) fn sender_key(sender: &Address, nonce: u64) -> [u8; 28] {
    let mut key = [0u8; 28];
    key[..20].copy_from_slice(sender.as_bytes());
    key[20..].copy_from_slice(&nonce.to_be_bytes());
    key
}

/// `by_recipient`: `recipient(20) ++ hash(32)` → empty.
pub(crate) fn recipient_key(recipient: &Address, hash: &TxHash) -> [u8; 52] {
    let mut key = [0u8; 52];
    key[..20].copy_from_slice(recipient.as_bytes());
    key[20..].copy_from_slice(hash.as_bytes());
    key
}

pub(crate) fn hash_from(bytes: &[u8]) -> Result<TxHash, LmdbError> {
    TxHash::from_slice(bytes).map_err(|e| LmdbError::Serialization(e.to_string()))
}

pub(crate) fn nonce_from_sender_key(key: &[u8]) -> Result<u64, LmdbError> {
    let tail: [u8; 8] = key
        .get(20..28)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| LmdbError::Serialization("invalid by_sender key length".into()))?;
    Ok(u64::from_be_bytes(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_keys_sort_by_nonce() {
        let a = Address::new([1; 20]);
        assert!(sender_key(&a, 1) < sender_key(&a, 2));
        assert!(sender_key(&a, 255) < sender_key(&a, 256));
    }

    #[test]
    fn nonce_parses_back() {
        let key = sender_key(&Address::new([1; 20]), 0xDEAD_BEEF);
        assert_eq!(nonce_from_sender_key(&key).unwrap(), 0xDEAD_BEEF);
        assert!(nonce_from_sender_key(&key[..10]).is_err());
    }

    #[test]
    fn child_key_prefix_is_parent() {
        let p = TxHash::new([7; 32]);
        let c = TxHash::new([8; 32]);
        assert_eq!(&child_key(&p, &c)[..32], p.as_bytes());
    }
}
