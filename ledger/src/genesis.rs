//! Genesis: the deterministic initial frontier of a network.
//!
//! Every entry of `NetworkConfig::alloc` becomes one transaction from the
//! zero address, in byte-lexicographic address order. The hash of the last
//! one written is the network fingerprint kept in the store header.

use tracing::info;

use dagnet_store::{DagStore, StoreMeta};
use dagnet_transactions::Transaction;
use dagnet_types::{Address, NetworkConfig, Timestamp, TxHash};

use crate::error::LedgerError;

/// Build the genesis transactions for `config`, in write order.
///
/// Zero-amount entries are kept so every listed address appears in the
/// frontier.
pub fn build_genesis(config: &NetworkConfig) -> Result<Vec<Transaction>, LedgerError> {
    if config.alloc.is_empty() {
        return Err(LedgerError::InvalidEncoding("genesis allocation is empty".into()));
    }
    Ok(config
        .alloc
        .iter()
        .map(|(address, amount)| {
            let mut tx = Transaction {
                nonce: 0,
                sender: Address::ZERO,
                recipient: *address,
                value: amount.clone(),
                parents: Vec::new(),
                gas_limit: 0,
                gas_price: 0,
                payload: config.identifier.as_bytes().to_vec(),
                timestamp: Timestamp::EPOCH,
                sender_public_key: None,
                signature: None,
                hash: TxHash::ZERO,
            };
            tx.seal(config.hash_id);
            tx
        })
        .collect())
}

/// Fingerprint of a network: hash of its last genesis transaction.
pub fn genesis_fingerprint(config: &NetworkConfig) -> Result<TxHash, LedgerError> {
    let genesis = build_genesis(config)?;
    fingerprint_of(&genesis)
}

/// Store header describing `config` and its genesis frontier.
pub fn genesis_meta(
    config: &NetworkConfig,
    genesis: &[Transaction],
    schema_version: u32,
) -> Result<StoreMeta, LedgerError> {
    Ok(StoreMeta {
        genesis: fingerprint_of(genesis)?,
        hash_id: config.hash_id,
        curve_id: config.curve_id,
        identifier: config.identifier.clone(),
        version: schema_version,
    })
}

/// Write the genesis frontier and header of a fresh store in one commit.
///
/// A store that already has a header refuses with `AlreadyInitialized`.
pub fn initialize_genesis<S: DagStore>(
    store: &S,
    config: &NetworkConfig,
    schema_version: u32,
) -> Result<StoreMeta, LedgerError> {
    let genesis = build_genesis(config)?;
    let meta = genesis_meta(config, &genesis, schema_version)?;
    store.initialize(&meta, &genesis)?;
    info!(
        network = %config.identifier,
        transactions = genesis.len(),
        fingerprint = %meta.genesis,
        "genesis written"
    );
    Ok(meta)
}

fn fingerprint_of(genesis: &[Transaction]) -> Result<TxHash, LedgerError> {
    genesis
        .last()
        .map(|tx| tx.hash)
        .ok_or_else(|| LedgerError::InvalidEncoding("genesis allocation is empty".into()))
}
