//! End-to-end scenarios against a real LMDB store in a temp directory:
//! genesis, spends, overspend, out-of-order delivery, duplicates and
//! restart.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use dagnet_ledger::{
    AdmissionCheck, ErrorKind, LedgerError, ValidationContext, Validator, ValidatorConfig,
};
use dagnet_messages::Frame;
use dagnet_node::{
    AdmissionOutcome, ConfigSource, DagNode, JsonConfigSource, NodeConfig, NodeError, Source,
};
use dagnet_nullables::{NullAccountStore, NullClock, NullTransport};
use dagnet_store::{DagSnapshot, DagStore};
use dagnet_store_lmdb::LmdbEnvironment;
use dagnet_transactions::{KeyPairSigner, Signer, Transaction};
use dagnet_types::{Address, Amount, Clock, CurveId, HashId, NetworkConfig, PeerId, Timestamp, TxHash};

const IDENTIFIER: &str = "scenario";
const MAP_SIZE: usize = 64 * 1024 * 1024;

struct World {
    dir: tempfile::TempDir,
    signer: KeyPairSigner,
    a: Address,
    b: Address,
    transport: Arc<NullTransport>,
    clock: Arc<NullClock>,
}

impl World {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let signer = KeyPairSigner::from_seed(CurveId::P256, &[0xA1; 32]).expect("seed");
        let a = signer.address(HashId::Blake3);
        let b = Address::new([0xB0; 20]);
        let mut alloc = BTreeMap::new();
        alloc.insert(a, Amount::from(100u64));
        alloc.insert(b, Amount::zero());
        let network = NetworkConfig {
            identifier: IDENTIFIER.into(),
            network: 7,
            hash_id: HashId::Blake3,
            curve_id: CurveId::P256,
            confirmation_depth: 6,
            alloc,
        };
        JsonConfigSource::in_data_dir(dir.path(), IDENTIFIER)
            .save(&network)
            .expect("save network config");
        Self {
            dir,
            signer,
            a,
            b,
            transport: Arc::new(NullTransport::with_peers([PeerId::new("p1"), PeerId::new("p2")])),
            clock: Arc::new(NullClock::from_secs(1_700_000_000)),
        }
    }

    fn config(&self) -> NodeConfig {
        config_in(self.dir.path())
    }

    fn source(&self) -> JsonConfigSource {
        JsonConfigSource::in_data_dir(self.dir.path(), IDENTIFIER)
    }

    async fn open(&self) -> Result<DagNode, NodeError> {
        DagNode::open(
            self.config(),
            &self.source(),
            self.transport.clone(),
            Arc::new(NullAccountStore::new()),
            self.clock.clone(),
        )
        .await
    }

    fn spend(&self, nonce: u64, parents: Vec<TxHash>, value: u64) -> Transaction {
        let mut tx = Transaction {
            nonce,
            sender: self.a,
            recipient: self.b,
            value: Amount::from(value),
            parents,
            gas_limit: 1,
            gas_price: 1,
            payload: Vec::new(),
            timestamp: Timestamp::from_nanos(1_000 + nonce),
            sender_public_key: None,
            signature: None,
            hash: TxHash::ZERO,
        };
        tx.seal(HashId::Blake3);
        tx.sign(&self.signer).expect("sign");
        tx
    }
}

fn config_in(dir: &Path) -> NodeConfig {
    NodeConfig {
        data_dir: dir.to_path_buf(),
        identifier: IDENTIFIER.into(),
        lmdb_map_size: MAP_SIZE,
        verify_signatures_on_open: true,
        ..NodeConfig::default()
    }
}

async fn genesis_hashes(node: &DagNode) -> Vec<TxHash> {
    node.handle().tips().await.expect("tips")
}

#[tokio::test]
async fn genesis_then_single_spend() {
    let world = World::new();
    let node = world.open().await.expect("open");
    let h = node.handle();

    let genesis = genesis_hashes(&node).await;
    assert_eq!(genesis.len(), 2);
    let best = h.best_tip().await.expect("best tip");
    assert_eq!(Some(&best), genesis.iter().max());
    assert_eq!(h.balance_of(world.a).await.expect("balance"), Amount::from(100u64));
    assert_eq!(h.balance_of(world.b).await.expect("balance"), Amount::zero());

    let t = world.spend(0, vec![best], 40);
    let outcome = h.admit(t.clone(), Source::Local, None).await.expect("admit");
    assert_eq!(outcome, AdmissionOutcome::Accepted);
    assert_eq!(h.balance_of(world.a).await.expect("balance"), Amount::from(59u64));
    assert_eq!(h.balance_of(world.b).await.expect("balance"), Amount::from(40u64));
    assert_eq!(h.get_transaction(t.hash).await.expect("get"), t);
    assert_eq!(h.children_of(best).await.expect("children"), vec![t.hash]);
    assert_eq!(
        h.transactions_by_sender(world.a).await.expect("by sender"),
        vec![t.clone()]
    );

    // Broadcast exactly once to every peer.
    let published = world
        .transport
        .sent()
        .into_iter()
        .filter(|(_, f)| *f == Frame::PublishTransaction(t.clone()))
        .count();
    assert_eq!(published, 2);
    node.shutdown().await;
}

/// The rejection carries only the kind; the detail stays local.
#[tokio::test]
async fn overspend_is_rejected_and_store_unchanged() {
    let world = World::new();
    let node = world.open().await.expect("open");
    let h = node.handle();
    let tip = h.best_tip().await.expect("tip");
    let t = world.spend(0, vec![tip], 40);
    h.admit(t.clone(), Source::Local, None).await.expect("admit");
    let count = h.transaction_count().await.expect("count");

    let overspend = world.spend(1, vec![t.hash], 1_000);
    let outcome = h
        .admit(overspend.clone(), Source::Local, None)
        .await
        .expect("admit");
    assert_eq!(outcome, AdmissionOutcome::Rejected(ErrorKind::InsufficientBalance));
    assert_eq!(h.transaction_count().await.expect("count"), count);
    assert_eq!(h.balance_of(world.a).await.expect("balance"), Amount::from(59u64));

    let store: &Arc<LmdbEnvironment> = h.store();
    let snapshot = store.snapshot().expect("snapshot");
    let validator = Validator::new(ValidatorConfig::for_network(h.network()));
    let err = validator
        .validate(&snapshot, &overspend, &ValidationContext::at(world.clock.now()))
        .unwrap_err();
    match err {
        LedgerError::InsufficientBalance { have, need } => {
            assert_eq!(have, Amount::from(59u64));
            assert_eq!(need, Amount::from(1_001u64));
        }
        other => panic!("unexpected error {other}"),
    }
    drop(snapshot);
    node.shutdown().await;
}

#[tokio::test]
async fn out_of_order_delivery_cascades() {
    let world = World::new();
    let node = world.open().await.expect("open");
    let h = node.handle();
    let genesis = genesis_hashes(&node).await;

    let t1 = world.spend(0, genesis, 10);
    let t2 = world.spend(1, vec![t1.hash], 10);

    let deferred = h.admit(t2.clone(), Source::Local, None).await.expect("t2");
    assert_eq!(deferred, AdmissionOutcome::Deferred(vec![t1.hash]));
    assert!(!h.contains(t2.hash).await.expect("contains"));
    assert_eq!(h.orphan_count().await.expect("orphans"), 1);

    let accepted = h.admit(t1.clone(), Source::Local, None).await.expect("t1");
    assert_eq!(accepted, AdmissionOutcome::Accepted);
    assert!(h.contains(t2.hash).await.expect("contains"));
    assert_eq!(h.tips().await.expect("tips"), vec![t2.hash]);
    assert_eq!(h.orphan_count().await.expect("orphans"), 0);
    let nonces: Vec<u64> = h
        .transactions_by_sender(world.a)
        .await
        .expect("by sender")
        .iter()
        .map(|t| t.nonce)
        .collect();
    assert_eq!(nonces, vec![0, 1]);
    node.shutdown().await;
}

#[tokio::test]
async fn duplicate_has_no_side_effects() {
    let world = World::new();
    let node = world.open().await.expect("open");
    let h = node.handle();
    let tip = h.best_tip().await.expect("tip");
    let t = world.spend(0, vec![tip], 40);
    h.admit(t.clone(), Source::Local, None).await.expect("admit");

    let sent_before = world.transport.sent().len();
    let count = h.transaction_count().await.expect("count");
    let outcome = h
        .admit(t.clone(), Source::Peer(PeerId::new("p1")), None)
        .await
        .expect("again");
    assert_eq!(outcome, AdmissionOutcome::Rejected(ErrorKind::DuplicateTransaction));
    assert_eq!(world.transport.sent().len(), sent_before);
    assert_eq!(h.transaction_count().await.expect("count"), count);
    assert_eq!(h.peer_score(&PeerId::new("p1")).await.expect("score"), 0);
    node.shutdown().await;
}

/// A committed spend survives restart with every index intact.
#[tokio::test]
async fn restart_preserves_state() {
    let world = World::new();
    let (t, tips, a_history) = {
        let node = world.open().await.expect("open");
        let h = node.handle();
        let tip = h.best_tip().await.expect("tip");
        let t = world.spend(0, vec![tip], 40);
        h.admit(t.clone(), Source::Local, None).await.expect("admit");
        let tips = h.tips().await.expect("tips");
        let history = h.transactions_of_address(world.a).await.expect("history");
        node.shutdown().await;
        (t, tips, history)
    };

    let node = world.open().await.expect("reopen");
    let h = node.handle();
    assert_eq!(h.get_transaction(t.hash).await.expect("get"), t);
    assert_eq!(h.tips().await.expect("tips"), tips);
    assert_eq!(h.transactions_of_address(world.a).await.expect("history"), a_history);
    assert_eq!(h.balance_of(world.a).await.expect("balance"), Amount::from(59u64));
    assert_eq!(h.next_nonce(world.a).await.expect("nonce"), 1);
    node.shutdown().await;
}

#[tokio::test]
async fn reopen_with_different_network_is_refused() {
    let world = World::new();
    world.open().await.expect("open").shutdown().await;

    let mut other = world.source().load().expect("load");
    other.alloc.insert(world.b, Amount::from(1u64));
    let err = DagNode::open(
        world.config(),
        &other,
        world.transport.clone(),
        Arc::new(NullAccountStore::new()),
        world.clock.clone(),
    )
    .await
    .err()
    .expect("mismatch");
    assert!(matches!(err, NodeError::NetworkMismatch(_)), "{err}");
}

#[tokio::test]
async fn corrupted_store_refuses_to_open() {
    let world = World::new();
    world.open().await.expect("open").shutdown().await;

    {
        let env = LmdbEnvironment::open(&world.config().db_path(), MAP_SIZE).expect("raw open");
        let orphaned = world.spend(0, vec![TxHash::new([0x99; 32])], 1);
        env.put(&orphaned).expect("raw put");
    }

    let err = world.open().await.err().expect("corruption");
    assert!(err.is_fatal(), "{err}");
}

#[tokio::test]
async fn gossip_publish_is_admitted_and_relayed() {
    let world = World::new();
    let node = world.open().await.expect("open");
    let h = node.handle();
    let tip = h.best_tip().await.expect("tip");
    let t = world.spend(0, vec![tip], 5);

    h.handle_frame(&PeerId::new("p1"), &Frame::PublishTransaction(t.clone()).encode().expect("encode"))
        .await
        .expect("frame");
    h.flush_publishes().await.expect("flush");

    assert!(h.contains(t.hash).await.expect("contains"));
    assert_eq!(
        world.transport.sent_to(&PeerId::new("p2")),
        vec![Frame::PublishTransaction(t.clone())]
    );
    assert!(world.transport.sent_to(&PeerId::new("p1")).is_empty());
    assert_eq!(h.peer_score(&PeerId::new("p1")).await.expect("score"), 1);
    node.shutdown().await;
}
