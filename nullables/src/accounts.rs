//! Nullable account store: signers held in memory.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use dagnet_transactions::{AccountStore, Signer};
use dagnet_types::{Address, HashId};

#[derive(Default)]
pub struct NullAccountStore {
    signers: RwLock<HashMap<Address, Arc<dyn Signer>>>,
}

impl NullAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `signer` under the address its key hashes to.
    pub fn insert(&self, hash_id: HashId, signer: Arc<dyn Signer>) -> Address {
        let address = signer.address(hash_id);
        self.signers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, signer);
        address
    }
}

impl AccountStore for NullAccountStore {
    fn signer(&self, address: &Address) -> Option<Arc<dyn Signer>> {
        self.signers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }
}
