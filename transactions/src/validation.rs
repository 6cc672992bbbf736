//! Stateless well-formedness checks.
//!
//! These need nothing but the transaction and the network hash function.
//! Checks against stored state (duplicates, parents, nonces, balances) are
//! done by the ledger validator.

use std::collections::HashSet;

use dagnet_types::HashId;

use crate::error::TransactionError;
use crate::{Transaction, MAX_PARENTS, MAX_PAYLOAD_LEN};

/// Validate a transaction's structure and that its claimed hash recomputes.
pub fn check_well_formed(tx: &Transaction, hash_id: HashId) -> Result<(), TransactionError> {
    if tx.hash.is_zero() {
        return Err(TransactionError::NilHash);
    }

    if tx.sender.is_zero() {
        if !tx.parents.is_empty() {
            return Err(TransactionError::GenesisWithParents);
        }
    } else {
        if tx.parents.is_empty() {
            return Err(TransactionError::NoParents);
        }
        if tx.parents.len() > MAX_PARENTS {
            return Err(TransactionError::TooManyParents(tx.parents.len()));
        }
    }

    let mut seen = HashSet::with_capacity(tx.parents.len());
    for parent in &tx.parents {
        if !seen.insert(*parent) {
            return Err(TransactionError::DuplicateParent(*parent));
        }
    }

    if tx.payload.len() > MAX_PAYLOAD_LEN {
        return Err(TransactionError::PayloadTooLarge(tx.payload.len()));
    }

    let computed = tx.compute_hash(hash_id);
    if computed != tx.hash {
        return Err(TransactionError::HashMismatch {
            claimed: tx.hash,
            computed,
        });
    }

    Ok(())
}
