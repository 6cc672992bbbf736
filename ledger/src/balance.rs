//! Balance engine.
//!
//! A balance is the sum of `+value` over transactions paying an address
//! minus `value + gas_limit * gas_price` over transactions it spent. Genesis
//! transactions credit their recipient and debit no one. All arithmetic is
//! arbitrary-precision integer arithmetic, so every node computes the same
//! result for the same set of transactions.

use num_bigint::BigInt;

use dagnet_store::DagSnapshot;
use dagnet_transactions::Transaction;
use dagnet_types::{Address, Amount, TxHash};

use crate::arena::DagArena;
use crate::deadline::Deadline;
use crate::error::LedgerError;

/// Apply one transaction's effect on `address` to a running balance.
pub fn apply(balance: &mut BigInt, tx: &Transaction, address: &Address) {
    if tx.recipient == *address {
        *balance += tx.value.to_bigint();
    }
    if !tx.is_genesis() && tx.sender == *address {
        *balance -= tx.cost().to_bigint();
    }
}

/// Balance of `address` over every transaction in the snapshot.
///
/// Every stored transaction is an ancestor of some tip, so the full past
/// cone of the tip set is the whole store; the sender and recipient indexes
/// enumerate exactly the transactions that touch `address` within it.
pub fn balance_of<S: DagSnapshot>(
    snapshot: &S,
    address: &Address,
    deadline: &Deadline,
) -> Result<Amount, LedgerError> {
    if address.is_zero() {
        return Ok(Amount::zero());
    }
    let mut balance = BigInt::default();
    for hash in snapshot.by_recipient(address)? {
        deadline.check()?;
        balance += load(snapshot, &hash)?.value.to_bigint();
    }
    // The sender index never holds genesis transactions.
    for hash in snapshot.by_sender(address)? {
        deadline.check()?;
        balance -= load(snapshot, &hash)?.cost().to_bigint();
    }
    Amount::from_bigint(&balance).ok_or_else(|| {
        LedgerError::StoreCorruption(format!("balance of {address} is negative: {balance}"))
    })
}

/// Balance of `address` over the past cone of `heads`, by reverse
/// breadth-first traversal.
///
/// The result can be negative when `heads` excludes credits that a spend in
/// the cone relied on.
pub fn balance_at<S: DagSnapshot>(
    snapshot: &S,
    address: &Address,
    heads: &[TxHash],
    deadline: &Deadline,
) -> Result<BigInt, LedgerError> {
    if address.is_zero() {
        return Ok(BigInt::default());
    }
    let arena = DagArena::load_past_cone(snapshot, heads.iter().copied(), deadline)?;
    let mut balance = BigInt::default();
    for tx in arena.transactions() {
        apply(&mut balance, tx, address);
    }
    Ok(balance)
}

fn load<S: DagSnapshot>(snapshot: &S, hash: &TxHash) -> Result<Transaction, LedgerError> {
    snapshot.get_transaction(hash)?.ok_or_else(|| {
        LedgerError::StoreCorruption(format!("index points at missing transaction {hash}"))
    })
}
