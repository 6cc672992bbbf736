//! Shared fixtures for ledger unit tests.

use std::collections::BTreeMap;

use dagnet_nullables::NullDagStore;
use dagnet_store::DagStore;
use dagnet_transactions::{KeyPairSigner, Signer, Transaction};
use dagnet_types::{Address, Amount, CurveId, HashId, NetworkConfig, Timestamp, TxHash};

use crate::genesis::initialize_genesis;

pub struct Fixture {
    pub store: NullDagStore,
    pub config: NetworkConfig,
    pub signer: KeyPairSigner,
    pub sender: Address,
    pub genesis: Vec<Transaction>,
    pub spends: Vec<Transaction>,
}

pub fn payee() -> Address {
    Address::new([0xB0; 20])
}

pub fn test_signer() -> KeyPairSigner {
    KeyPairSigner::from_seed(CurveId::Ed25519, &[7; 32]).expect("seed")
}

/// Network with `sender` funded at 1000 and an unfunded bystander.
pub fn network(sender: Address) -> NetworkConfig {
    let mut alloc = BTreeMap::new();
    alloc.insert(sender, Amount::from(1000u64));
    alloc.insert(Address::new([0xC0; 20]), Amount::zero());
    NetworkConfig {
        identifier: "ledger-test".into(),
        network: 1,
        hash_id: HashId::Blake3,
        curve_id: CurveId::Ed25519,
        confirmation_depth: 2,
        alloc,
    }
}

/// A sealed and signed spend of `value` with one unit of gas at price 1.
pub fn spend(
    signer: &dyn Signer,
    config: &NetworkConfig,
    nonce: u64,
    parents: Vec<TxHash>,
    timestamp: u64,
    recipient: Address,
    value: u64,
) -> Transaction {
    let mut tx = Transaction {
        nonce,
        sender: signer.address(config.hash_id),
        recipient,
        value: Amount::from(value),
        parents,
        gas_limit: 1,
        gas_price: 1,
        payload: Vec::new(),
        timestamp: Timestamp::from_nanos(timestamp),
        sender_public_key: None,
        signature: None,
        hash: TxHash::ZERO,
    };
    tx.seal(config.hash_id);
    tx.sign(signer).expect("sign");
    tx
}

/// Genesis plus a chain of `n` spends of 10 to [`payee`], written straight
/// into the store. Spend `i` has nonce `i`, timestamp `(i + 1) * 1000` and
/// the previous spend (or the sender's genesis credit) as its only parent.
pub fn chain_fixture(n: usize) -> Fixture {
    let signer = test_signer();
    let sender = signer.address(HashId::Blake3);
    let config = network(sender);
    let store = NullDagStore::new();
    initialize_genesis(&store, &config, 1).expect("genesis");
    let genesis = crate::genesis::build_genesis(&config).expect("genesis");
    let credit = genesis
        .iter()
        .find(|g| g.recipient == sender)
        .map(|g| g.hash)
        .expect("sender credit");

    let mut spends: Vec<Transaction> = Vec::with_capacity(n);
    for i in 0..n {
        let parent = spends.last().map_or(credit, |t| t.hash);
        let t = spend(&signer, &config, i as u64, vec![parent], (i as u64 + 1) * 1000, payee(), 10);
        store.put(&t).expect("put");
        spends.push(t);
    }
    Fixture {
        store,
        config,
        signer,
        sender,
        genesis,
        spends,
    }
}
