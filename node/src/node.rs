//! The dagnet node: one network's store, admission controller and gossip
//! adapter behind a cloneable [`DagHandle`].
//!
//! All writes go through the [`AdmissionController`], which sits behind a
//! mutex and is only ever locked on the blocking pool, so admissions are
//! serialized and LMDB transactions never cross an `.await`. Inbound
//! `PublishTransaction` frames go through a bounded queue drained by one
//! task; everything else (local submissions, responses, queries) bypasses
//! it and is never dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use dagnet_ledger::{
    genesis_fingerprint, initialize_genesis, DagQuery, Deadline, LedgerError, Validator,
    ValidatorConfig,
};
use dagnet_messages::{Frame, PeerTransport};
use dagnet_store::{DagSnapshot, DagStore, StoreMeta};
use dagnet_store_lmdb::{check_integrity, LmdbEnvironment, Migrator, CURRENT_SCHEMA_VERSION};
use dagnet_transactions::{AccountStore, Transaction};
use dagnet_types::{Address, Amount, Clock, NetworkConfig, PeerId, PublicKey, TxHash};
use num_bigint::BigInt;

use crate::admission::{AdmissionController, AdmissionOutcome, Source};
use crate::config::{ConfigSource, NodeConfig};
use crate::gossip::Gossip;
use crate::metrics::NodeMetrics;
use crate::orphans::OrphanPool;
use crate::reputation::PenaltyReason;
use crate::shutdown::{ShutdownController, ShutdownSignal};
use crate::NodeError;

/// How long [`DagNode::shutdown`] waits for background tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A spend to be built, signed and admitted by [`DagHandle::create_transaction`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRequest {
    pub sender: Address,
    pub recipient: Address,
    pub value: Amount,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub payload: Vec<u8>,
}

enum PublishJob {
    Publish { peer: PeerId, tx: Transaction },
    /// Answered once every job queued before it has been processed.
    Flush(oneshot::Sender<()>),
}

struct Inner<S> {
    store: Arc<S>,
    network: NetworkConfig,
    meta: StoreMeta,
    config: NodeConfig,
    controller: Mutex<AdmissionController<S>>,
    publish_tx: mpsc::Sender<PublishJob>,
    /// Bounds in-flight work on the unqueued path.
    control_permits: Semaphore,
    gossip: Gossip,
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    shutdown: ShutdownController,
}

impl<S> Inner<S> {
    fn lock_controller(&self) -> MutexGuard<'_, AdmissionController<S>> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap, cloneable access to one running network.
pub struct DagHandle<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for DagHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Owns the background tasks of a running network.
pub struct DagNode<S: DagStore + 'static = LmdbEnvironment> {
    handle: DagHandle<S>,
    task_handles: Vec<JoinHandle<()>>,
}

impl DagNode<LmdbEnvironment> {
    /// Open (or create) the LMDB store for `config.identifier` and start the
    /// node.
    ///
    /// A fresh store gets its genesis written. An existing one is migrated,
    /// checked against `network`, and scanned for corruption when
    /// `verify_store_on_open` is set.
    pub async fn open(
        config: NodeConfig,
        network: &dyn ConfigSource,
        transport: Arc<dyn PeerTransport>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let network = network.load()?;
        if network.identifier != config.identifier {
            return Err(NodeError::Config(format!(
                "network config is for {:?}, node is configured for {:?}",
                network.identifier, config.identifier
            )));
        }

        let path = config.db_path();
        let map_size = config.lmdb_map_size;
        let verify = config.verify_store_on_open;
        let verify_signatures = config.verify_signatures_on_open;
        let net = network.clone();
        let (env, meta) = tokio::task::spawn_blocking(move || {
            let env = LmdbEnvironment::open(&path, map_size)?;
            Migrator::run(&env)?;
            if verify {
                let report = check_integrity(&env, verify_signatures)?;
                if !report.is_healthy() {
                    for problem in &report.errors {
                        error!(problem = %problem, "store integrity violation");
                    }
                    return Err(LedgerError::StoreCorruption(format!(
                        "{} integrity violation(s), first: {}",
                        report.errors.len(),
                        report.errors.first().map(String::as_str).unwrap_or_default()
                    ))
                    .into());
                }
                info!(
                    transactions = report.transactions_checked,
                    index_entries = report.index_entries_checked,
                    "store integrity verified"
                );
            }
            let meta = prepare_store(&env, &net)?;
            Ok::<_, NodeError>((env, meta))
        })
        .await??;

        info!(
            network = %network.identifier,
            path = %config.db_path().display(),
            genesis = %meta.genesis,
            "store opened"
        );
        Self::launch(Arc::new(env), meta, config, network, transport, accounts, clock)
    }
}

impl<S: DagStore + 'static> DagNode<S> {
    /// Start a node over an already opened store (an in-memory one in
    /// tests). Genesis is written if the store has no header yet.
    pub fn with_store(
        store: Arc<S>,
        config: NodeConfig,
        network: NetworkConfig,
        transport: Arc<dyn PeerTransport>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let meta = prepare_store(&*store, &network)?;
        Self::launch(store, meta, config, network, transport, accounts, clock)
    }

    fn launch(
        store: Arc<S>,
        meta: StoreMeta,
        config: NodeConfig,
        network: NetworkConfig,
        transport: Arc<dyn PeerTransport>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        let metrics = Arc::new(NodeMetrics::new()?);
        let validator = Validator::new(
            ValidatorConfig::for_network(&network).with_max_future_drift(config.max_future_drift()),
        );
        let controller = AdmissionController::new(
            Arc::clone(&store),
            validator,
            Arc::clone(&clock),
            OrphanPool::new(config.orphan_capacity, config.orphan_ttl()),
            Arc::clone(&metrics),
        );
        controller.refresh_gauges()?;

        let (publish_tx, publish_rx) = mpsc::channel(config.admission_queue_capacity);
        let control_permits = Semaphore::new(config.request_queue_capacity);
        let gossip = Gossip::new(transport, config.request_timeout());
        let handle = DagHandle {
            inner: Arc::new(Inner {
                store,
                network,
                meta,
                config,
                controller: Mutex::new(controller),
                publish_tx,
                control_permits,
                gossip,
                accounts,
                clock,
                metrics,
                shutdown: ShutdownController::new(),
            }),
        };

        let mut task_handles = Vec::new();

        // ── Publish queue: inbound gossip, one admission at a time ──────
        let publisher = handle.clone();
        let shutdown = handle.inner.shutdown.subscribe();
        task_handles.push(tokio::spawn(publisher.publish_loop(publish_rx, shutdown)));

        // ── Orphan sweeper ──────────────────────────────────────────────
        let sweeper = handle.clone();
        let mut shutdown = handle.inner.shutdown.subscribe();
        let period = handle.inner.config.orphan_sweep_interval();
        task_handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.wait() => break,
                    _ = interval.tick() => {
                        if let Err(e) = sweeper.sweep_orphans().await {
                            warn!(error = %e, "orphan sweep failed");
                        }
                    }
                }
            }
            debug!("orphan sweeper stopped");
        }));

        info!(
            network = %handle.inner.network.identifier,
            queue = handle.inner.config.admission_queue_capacity,
            orphans = handle.inner.config.orphan_capacity,
            "node started"
        );
        Ok(Self {
            handle,
            task_handles,
        })
    }

    pub fn handle(&self) -> &DagHandle<S> {
        &self.handle
    }

    /// Stop background tasks. Publishes still queued are discarded.
    pub async fn shutdown(mut self) {
        self.handle.inner.shutdown.shutdown();
        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            warn!(timeout = ?SHUTDOWN_TIMEOUT, "shutdown timed out, some tasks may still be running");
        }
        info!(network = %self.handle.inner.network.identifier, "node stopped");
    }
}

/// Write genesis into a fresh store, or check an existing store belongs to
/// `network`.
fn prepare_store<S: DagStore>(store: &S, network: &NetworkConfig) -> Result<StoreMeta, NodeError> {
    let existing = store.snapshot()?.meta()?;
    let Some(meta) = existing else {
        return Ok(initialize_genesis(store, network, CURRENT_SCHEMA_VERSION)?);
    };

    let fingerprint = genesis_fingerprint(network)?;
    let mismatch = if meta.identifier != network.identifier {
        Some(format!("identifier {:?} != {:?}", meta.identifier, network.identifier))
    } else if meta.hash_id != network.hash_id {
        Some(format!("hash_id {} != {}", meta.hash_id, network.hash_id))
    } else if meta.curve_id != network.curve_id {
        Some(format!("curve_id {} != {}", meta.curve_id, network.curve_id))
    } else if meta.genesis != fingerprint {
        Some(format!("genesis {} != {}", meta.genesis, fingerprint))
    } else {
        None
    };
    match mismatch {
        Some(detail) => Err(NodeError::NetworkMismatch(detail)),
        None => Ok(meta),
    }
}

fn query<S: DagStore>(store: &S, confirmation_depth: u32) -> Result<DagQuery<S::Snapshot<'_>>, LedgerError> {
    Ok(DagQuery::new(store.snapshot()?, confirmation_depth))
}

impl<S: DagStore + 'static> DagHandle<S> {
    pub fn network(&self) -> &NetworkConfig {
        &self.inner.network
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.inner.meta
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.inner.metrics
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    // ── Admission ───────────────────────────────────────────────────────

    /// Validate and store `tx`, bypassing the publish queue.
    ///
    /// `public_key` is used when the transaction does not carry its
    /// sender's key. Bans are not consulted here.
    pub async fn admit(
        &self,
        tx: Transaction,
        source: Source,
        public_key: Option<PublicKey>,
    ) -> Result<AdmissionOutcome, NodeError> {
        let _permit = self.control_permit().await?;
        let inner = Arc::clone(&self.inner);
        let peers = self.inner.gossip.peer_count();
        let deadline = Deadline::after(self.inner.config.request_timeout());
        let result = tokio::task::spawn_blocking(move || {
            let mut controller = inner.lock_controller();
            controller.set_peer_count(peers);
            controller.admit(tx, source, public_key, &deadline)
        })
        .await?;

        match result {
            Ok(report) => {
                self.inner.gossip.deliver(report.effects).await;
                Ok(report.outcome)
            }
            Err(e) => Err(self.escalate(e)),
        }
    }

    /// Admit a transaction received from `peer`, unless the peer is banned.
    async fn admit_from_peer(&self, peer: &PeerId, tx: Transaction) -> Result<(), NodeError> {
        if self.is_banned(peer).await? {
            debug!(peer = %peer, hash = %tx.hash, "ignoring transaction from banned peer");
            self.inner.metrics.record_drop("banned");
            return Ok(());
        }
        self.admit(tx, Source::Peer(peer.clone()), None).await?;
        Ok(())
    }

    /// Build, sign and admit a spend from a locally held account.
    ///
    /// The nonce is the sender's next one and the single parent is the
    /// current best tip. Both are read under the admission lock so
    /// concurrent calls cannot race for the same nonce.
    pub async fn create_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<(Transaction, AdmissionOutcome), NodeError> {
        let signer = self
            .inner
            .accounts
            .signer(&request.sender)
            .ok_or(NodeError::UnknownAccount(request.sender))?;
        let hash_id = self.inner.network.hash_id;
        if signer.address(hash_id) != request.sender {
            return Err(NodeError::Signing(format!(
                "signer key does not hash to {}",
                request.sender
            )));
        }

        let inner = Arc::clone(&self.inner);
        let peers = self.inner.gossip.peer_count();
        let deadline = Deadline::after(self.inner.config.request_timeout());
        let result = tokio::task::spawn_blocking(move || {
            let mut controller = inner.lock_controller();
            let k = inner.network.confirmation_depth;
            let (nonce, parent) = {
                let q = query(&*inner.store, k)?;
                let nonce = q.next_nonce(&request.sender)?;
                let parent = q.get_transaction(&q.best_tip(&deadline)?)?;
                (nonce, parent)
            };
            let mut tx = Transaction {
                nonce,
                sender: request.sender,
                recipient: request.recipient,
                value: request.value,
                parents: vec![parent.hash],
                gas_limit: request.gas_limit,
                gas_price: request.gas_price,
                payload: request.payload,
                // Never earlier than the parent, whose clock may run ahead.
                timestamp: inner.clock.now().max(parent.timestamp),
                sender_public_key: None,
                signature: None,
                hash: TxHash::ZERO,
            };
            tx.seal(hash_id);
            tx.sign(signer.as_ref())
                .map_err(|e| NodeError::Signing(e.to_string()))?;
            controller.set_peer_count(peers);
            let report = controller.admit(tx.clone(), Source::Local, None, &deadline)?;
            Ok::<_, NodeError>((tx, report))
        })
        .await?;

        match result {
            Ok((tx, report)) => {
                info!(hash = %tx.hash, nonce = tx.nonce, outcome = ?report.outcome, "local transaction created");
                self.inner.gossip.deliver(report.effects).await;
                Ok((tx, report.outcome))
            }
            Err(e) => Err(self.escalate(e)),
        }
    }

    /// Release a pending orphan. Its source's reputation is left alone.
    pub async fn cancel_orphan(&self, hash: TxHash) -> Result<bool, NodeError> {
        self.with_controller(move |c| c.cancel_orphan(&hash)).await
    }

    /// Drop orphans past their TTL; returns how many were dropped.
    pub async fn sweep_orphans(&self) -> Result<usize, NodeError> {
        self.with_controller(|c| c.sweep_orphans()).await
    }

    pub async fn orphan_count(&self) -> Result<usize, NodeError> {
        self.with_controller(|c| c.orphans().len()).await
    }

    pub async fn peer_score(&self, peer: &PeerId) -> Result<i32, NodeError> {
        let peer = peer.clone();
        self.with_controller(move |c| c.reputation().score(&peer)).await
    }

    pub async fn is_banned(&self, peer: &PeerId) -> Result<bool, NodeError> {
        let peer = peer.clone();
        self.with_controller(move |c| c.is_banned(&peer)).await
    }

    async fn penalize(&self, peer: &PeerId, reason: PenaltyReason) -> Result<bool, NodeError> {
        let peer = peer.clone();
        self.with_controller(move |c| c.penalize(&peer, reason)).await
    }

    /// Wait until every publish queued so far has been admitted.
    pub async fn flush_publishes(&self) -> Result<(), NodeError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .publish_tx
            .send(PublishJob::Flush(tx))
            .await
            .map_err(|_| NodeError::QueueClosed)?;
        rx.await.map_err(|_| NodeError::QueueClosed)
    }

    async fn with_controller<T, F>(&self, f: F) -> Result<T, NodeError>
    where
        F: FnOnce(&mut AdmissionController<S>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        Ok(tokio::task::spawn_blocking(move || {
            let mut controller = inner.lock_controller();
            f(&mut controller)
        })
        .await?)
    }

    async fn control_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, NodeError> {
        self.inner
            .control_permits
            .acquire()
            .await
            .map_err(|_| NodeError::QueueClosed)
    }

    /// Store corruption stops the node; the owner is expected to exit.
    fn escalate(&self, e: NodeError) -> NodeError {
        if e.is_fatal() {
            error!(error = %e, "fatal store error, stopping node");
            self.inner.shutdown.shutdown();
        }
        e
    }

    async fn publish_loop(self, mut rx: mpsc::Receiver<PublishJob>, mut shutdown: ShutdownSignal) {
        loop {
            let job = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            match job {
                PublishJob::Flush(reply) => {
                    let _ = reply.send(());
                }
                PublishJob::Publish { peer, tx } => {
                    let hash = tx.hash;
                    if let Err(e) = self.admit_from_peer(&peer, tx).await {
                        warn!(hash = %hash, error = %e, "publish admission failed");
                    }
                }
            }
        }
        debug!("publish queue stopped");
    }

    // ── Gossip ──────────────────────────────────────────────────────────

    /// Decode and act on one inbound frame from `peer`.
    ///
    /// A frame that does not decode costs the peer reputation and is
    /// returned as an error so the transport can decide to disconnect.
    pub async fn handle_frame(&self, peer: &PeerId, bytes: &[u8]) -> Result<(), NodeError> {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(peer = %peer, error = %e, "malformed frame");
                self.inner.metrics.record_drop("malformed");
                self.penalize(peer, PenaltyReason::MalformedFrame).await?;
                return Err(e.into());
            }
        };
        self.handle_message(peer, frame).await
    }

    pub async fn handle_message(&self, peer: &PeerId, frame: Frame) -> Result<(), NodeError> {
        match frame {
            Frame::PublishTransaction(tx) => self.enqueue_publish(peer, tx),
            Frame::RequestConfig => {
                let config = self.inner.network.clone();
                self.inner.gossip.send(peer, Frame::RespondConfig(config)).await;
                Ok(())
            }
            Frame::RespondConfig(config) => self.check_peer_config(peer, &config).await,
            Frame::RequestBestTip => {
                let tip = self.best_tip().await?;
                self.inner.gossip.send(peer, Frame::RespondBestTip(tip)).await;
                Ok(())
            }
            Frame::RespondBestTip(hash) => {
                if !self.contains(hash).await? {
                    debug!(peer = %peer, hash = %hash, "peer best tip unknown, requesting it");
                    self.inner.gossip.request_transaction(peer, hash).await;
                }
                Ok(())
            }
            Frame::RequestTransaction(hash) => {
                let found = self
                    .read(move |store, _, _| Ok(store.snapshot()?.get_transaction(&hash)?))
                    .await?;
                self.inner
                    .gossip
                    .send(peer, Frame::RespondTransaction(found))
                    .await;
                Ok(())
            }
            Frame::RespondTransaction(Some(tx)) => {
                self.admit_from_peer(peer, tx).await
            }
            Frame::RespondTransaction(None) => {
                debug!(peer = %peer, "peer does not have requested transaction");
                Ok(())
            }
            Frame::TransactionRejected(hash) => {
                debug!(peer = %peer, hash = %hash, "peer rejected transaction");
                Ok(())
            }
        }
    }

    fn enqueue_publish(&self, peer: &PeerId, tx: Transaction) -> Result<(), NodeError> {
        let job = PublishJob::Publish {
            peer: peer.clone(),
            tx,
        };
        match self.inner.publish_tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(peer = %peer, "admission queue full, publish dropped");
                self.inner.metrics.record_drop("queue_full");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NodeError::QueueClosed),
        }
    }

    async fn check_peer_config(&self, peer: &PeerId, theirs: &NetworkConfig) -> Result<(), NodeError> {
        let ours = &self.inner.network;
        let same = theirs.identifier == ours.identifier
            && theirs.hash_id == ours.hash_id
            && theirs.curve_id == ours.curve_id
            && genesis_fingerprint(theirs).ok() == Some(self.inner.meta.genesis);
        if same {
            debug!(peer = %peer, "peer network config matches");
        } else {
            warn!(peer = %peer, network = %theirs.identifier, "peer is on a different network");
            self.penalize(peer, PenaltyReason::ConfigMismatch).await?;
        }
        Ok(())
    }

    /// Ask `peer` which network it is on.
    pub async fn request_config(&self, peer: &PeerId) -> bool {
        self.inner.gossip.send(peer, Frame::RequestConfig).await
    }

    /// Ask `peer` for its best tip; an unknown answer is fetched.
    pub async fn request_best_tip(&self, peer: &PeerId) -> bool {
        self.inner.gossip.send(peer, Frame::RequestBestTip).await
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Run a read on the blocking pool under the query timeout. Corruption
    /// found by a read stops the node like corruption found on admission.
    async fn read<T, F>(&self, f: F) -> Result<T, NodeError>
    where
        F: FnOnce(&S, u32, &Deadline) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self.control_permit().await?;
        let store = Arc::clone(&self.inner.store);
        let k = self.inner.network.confirmation_depth;
        let deadline = Deadline::after(self.inner.config.query_timeout());
        let result = tokio::task::spawn_blocking(move || f(&store, k, &deadline)).await?;
        result.map_err(|e| self.escalate(e.into()))
    }

    pub async fn contains(&self, hash: TxHash) -> Result<bool, NodeError> {
        self.read(move |store, _, _| Ok(store.snapshot()?.contains(&hash)?))
            .await
    }

    pub async fn get_transaction(&self, hash: TxHash) -> Result<Transaction, NodeError> {
        self.read(move |store, k, _| query(store, k)?.get_transaction(&hash))
            .await
    }

    pub async fn children_of(&self, hash: TxHash) -> Result<Vec<TxHash>, NodeError> {
        self.read(move |store, k, _| {
            Ok(query(store, k)?.children_of(&hash)?.into_iter().collect())
        })
        .await
    }

    pub async fn transactions_of_address(&self, address: Address) -> Result<Vec<Transaction>, NodeError> {
        self.read(move |store, k, _| query(store, k)?.transactions_of_address(&address))
            .await
    }

    /// Spends by `address`, in nonce order.
    pub async fn transactions_by_sender(&self, address: Address) -> Result<Vec<Transaction>, NodeError> {
        self.read(move |store, k, _| query(store, k)?.transactions_by_sender(&address))
            .await
    }

    pub async fn tips(&self) -> Result<Vec<TxHash>, NodeError> {
        self.read(|store, k, _| Ok(query(store, k)?.tips()?.into_iter().collect()))
            .await
    }

    pub async fn transaction_count(&self) -> Result<u64, NodeError> {
        self.read(|store, k, _| query(store, k)?.transaction_count())
            .await
    }

    pub async fn best_tip(&self) -> Result<TxHash, NodeError> {
        self.read(|store, k, deadline| query(store, k)?.best_tip(deadline))
            .await
    }

    pub async fn balance_of(&self, address: Address) -> Result<Amount, NodeError> {
        self.read(move |store, k, deadline| query(store, k)?.balance_of(&address, deadline))
            .await
    }

    /// Balance as seen from the past cone of `heads`.
    pub async fn balance_at(&self, address: Address, heads: Vec<TxHash>) -> Result<BigInt, NodeError> {
        self.read(move |store, k, deadline| {
            query(store, k)?.balance_at(&address, &heads, deadline)
        })
        .await
    }

    pub async fn confirmation_depth_of(&self, hash: TxHash) -> Result<u64, NodeError> {
        self.read(move |store, k, deadline| query(store, k)?.confirmation_depth_of(&hash, deadline))
            .await
    }

    pub async fn is_finalized(&self, hash: TxHash) -> Result<bool, NodeError> {
        self.read(move |store, k, deadline| query(store, k)?.is_finalized(&hash, deadline))
            .await
    }

    pub async fn next_nonce(&self, address: Address) -> Result<u64, NodeError> {
        self.read(move |store, k, _| query(store, k)?.next_nonce(&address))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use dagnet_ledger::ErrorKind;
    use dagnet_nullables::{NullAccountStore, NullClock, NullDagStore, NullTransport};
    use dagnet_transactions::{KeyPairSigner, Signer};
    use dagnet_types::{CurveId, HashId};

    use crate::reputation::BAN_THRESHOLD;

    struct TestNode {
        node: DagNode<NullDagStore>,
        transport: Arc<NullTransport>,
        clock: Arc<NullClock>,
        alice: Address,
        bob: Address,
    }

    fn network(alice: Address, bob: Address) -> NetworkConfig {
        let mut alloc = BTreeMap::new();
        alloc.insert(alice, Amount::from(100u64));
        alloc.insert(bob, Amount::zero());
        NetworkConfig {
            identifier: "unit".into(),
            network: 1,
            hash_id: HashId::Blake3,
            curve_id: CurveId::Ed25519,
            confirmation_depth: 2,
            alloc,
        }
    }

    fn start(peers: &[&str]) -> TestNode {
        start_with(peers, NodeConfig {
            identifier: "unit".into(),
            ..NodeConfig::default()
        })
    }

    fn start_with(peers: &[&str], config: NodeConfig) -> TestNode {
        let accounts = Arc::new(NullAccountStore::new());
        let signer = KeyPairSigner::from_seed(CurveId::Ed25519, &[5; 32]).expect("seed");
        let alice = accounts.insert(HashId::Blake3, Arc::new(signer));
        let bob = Address::new([0xB0; 20]);
        let transport = Arc::new(NullTransport::with_peers(peers.iter().map(|p| PeerId::new(*p))));
        let clock = Arc::new(NullClock::from_secs(1_000));
        let node = DagNode::with_store(
            Arc::new(NullDagStore::new()),
            config,
            network(alice, bob),
            transport.clone(),
            accounts,
            clock.clone(),
        )
        .expect("start");
        TestNode {
            node,
            transport,
            clock,
            alice,
            bob,
        }
    }

    fn request(t: &TestNode, value: u64) -> TransactionRequest {
        TransactionRequest {
            sender: t.alice,
            recipient: t.bob,
            value: Amount::from(value),
            gas_limit: 1,
            gas_price: 1,
            payload: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_transaction_spends_from_best_tip_and_broadcasts() {
        let t = start(&["p1", "p2"]);
        let h = t.node.handle();
        let tip = h.best_tip().await.expect("tip");

        let (tx, outcome) = h.create_transaction(request(&t, 40)).await.expect("create");
        assert_eq!(outcome, AdmissionOutcome::Accepted);
        assert_eq!(tx.nonce, 0);
        assert_eq!(tx.parents, vec![tip]);
        assert_eq!(h.balance_of(t.alice).await.expect("balance"), Amount::from(59u64));
        assert_eq!(h.balance_of(t.bob).await.expect("balance"), Amount::from(40u64));
        assert_eq!(h.next_nonce(t.alice).await.expect("nonce"), 1);

        let published: Vec<_> = t
            .transport
            .sent()
            .into_iter()
            .filter(|(_, f)| *f == Frame::PublishTransaction(tx.clone()))
            .map(|(p, _)| p)
            .collect();
        assert_eq!(published, vec![PeerId::new("p1"), PeerId::new("p2")]);
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn create_transaction_for_unknown_account_fails() {
        let t = start(&[]);
        let mut req = request(&t, 1);
        req.sender = Address::new([9; 20]);
        let err = t.node.handle().create_transaction(req).await.unwrap_err();
        assert!(matches!(err, NodeError::UnknownAccount(_)));
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn corruption_found_by_a_query_stops_the_node() {
        let t = start(&[]);
        let h = t.node.handle();
        let (tx, _) = h.create_transaction(request(&t, 1)).await.expect("create");
        let mut broken = tx.clone();
        broken.nonce = 1;
        broken.parents = vec![TxHash::new([0x99; 32])];
        broken.seal(HashId::Blake3);
        h.store().put(&broken).expect("raw put");

        let err = h
            .balance_at(t.alice, vec![broken.hash])
            .await
            .unwrap_err();
        assert!(err.is_fatal(), "{err}");
        assert!(h.inner.shutdown.is_shutdown());
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn missing_hash_in_a_query_is_not_fatal() {
        let t = start(&[]);
        let h = t.node.handle();
        let err = h.get_transaction(TxHash::new([0x42; 32])).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(!h.inner.shutdown.is_shutdown());
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn finality_follows_descendants() {
        let t = start(&[]);
        let h = t.node.handle();
        let (first, _) = h.create_transaction(request(&t, 1)).await.expect("first");
        assert!(!h.is_finalized(first.hash).await.expect("finalized"));
        h.create_transaction(request(&t, 1)).await.expect("second");
        h.create_transaction(request(&t, 1)).await.expect("third");
        assert_eq!(h.confirmation_depth_of(first.hash).await.expect("depth"), 2);
        assert!(h.is_finalized(first.hash).await.expect("finalized"));
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn request_frames_are_answered() {
        let t = start(&["p1"]);
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        let tip = h.best_tip().await.expect("tip");

        h.handle_frame(&peer, &Frame::RequestBestTip.encode().expect("encode")).await.expect("best tip");
        h.handle_frame(&peer, &Frame::RequestConfig.encode().expect("encode")).await.expect("config");
        h.handle_frame(&peer, &Frame::RequestTransaction(tip).encode().expect("encode"))
            .await
            .expect("known");
        h.handle_frame(&peer, &Frame::RequestTransaction(TxHash::new([1; 32])).encode().expect("encode"))
            .await
            .expect("unknown");

        let genesis_tip = h.get_transaction(tip).await.expect("tip tx");
        assert_eq!(
            t.transport.sent_to(&peer),
            vec![
                Frame::RespondBestTip(tip),
                Frame::RespondConfig(h.network().clone()),
                Frame::RespondTransaction(Some(genesis_tip)),
                Frame::RespondTransaction(None),
            ]
        );
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_best_tip_is_fetched() {
        let t = start(&["p1"]);
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        let theirs = TxHash::new([0xEE; 32]);
        h.handle_frame(&peer, &Frame::RespondBestTip(theirs).encode().expect("encode"))
            .await
            .expect("respond");
        let ours = h.best_tip().await.expect("tip");
        h.handle_frame(&peer, &Frame::RespondBestTip(ours).encode().expect("encode"))
            .await
            .expect("respond");
        assert_eq!(t.transport.sent_to(&peer), vec![Frame::RequestTransaction(theirs)]);
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_frame_costs_reputation() {
        let t = start(&["p1"]);
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        assert!(h.handle_frame(&peer, &[0, 0, 0, 1, 0x7F]).await.is_err());
        assert!(h.peer_score(&peer).await.expect("score") < 0);
        assert_eq!(
            h.metrics().frames_dropped.with_label_values(&["malformed"]).get(),
            1
        );
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn foreign_config_bans_peer() {
        let t = start(&["p1"]);
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        let mut foreign = h.network().clone();
        foreign.alloc.insert(Address::new([0xCC; 20]), Amount::from(1u64));
        h.handle_frame(&peer, &Frame::RespondConfig(foreign).encode().expect("encode"))
            .await
            .expect("respond");
        assert!(h.peer_score(&peer).await.expect("score") <= BAN_THRESHOLD);
        assert!(h.is_banned(&peer).await.expect("banned"));

        let same = h.network().clone();
        let other = PeerId::new("p2");
        h.handle_frame(&other, &Frame::RespondConfig(same).encode().expect("encode"))
            .await
            .expect("respond");
        assert_eq!(h.peer_score(&other).await.expect("score"), 0);
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn publishes_from_banned_peer_are_ignored() {
        let t = start(&["p1"]);
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        let mut foreign = h.network().clone();
        foreign.identifier = "elsewhere".into();
        h.handle_frame(&peer, &Frame::RespondConfig(foreign).encode().expect("encode"))
            .await
            .expect("respond");

        let signer = KeyPairSigner::from_seed(CurveId::Ed25519, &[5; 32]).expect("seed");
        let tip = h.best_tip().await.expect("tip");
        let mut tx = Transaction {
            nonce: 0,
            sender: signer.address(HashId::Blake3),
            recipient: t.bob,
            value: Amount::from(1u64),
            parents: vec![tip],
            gas_limit: 0,
            gas_price: 0,
            payload: Vec::new(),
            timestamp: t.clock.now(),
            sender_public_key: None,
            signature: None,
            hash: TxHash::ZERO,
        };
        tx.seal(HashId::Blake3);
        tx.sign(&signer).expect("sign");

        h.handle_frame(&peer, &Frame::PublishTransaction(tx.clone()).encode().expect("encode"))
            .await
            .expect("publish");
        h.flush_publishes().await.expect("flush");
        assert!(!h.contains(tx.hash).await.expect("contains"));
        assert_eq!(h.metrics().frames_dropped.with_label_values(&["banned"]).get(), 1);
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn full_publish_queue_drops_and_counts() {
        let t = start_with(&["p1"], NodeConfig {
            identifier: "unit".into(),
            admission_queue_capacity: 1,
            ..NodeConfig::default()
        });
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        let tip = h.best_tip().await.expect("tip");
        let genesis = h.get_transaction(tip).await.expect("genesis");

        // Hold the admission lock so the queue cannot drain.
        let inner = Arc::clone(&h.inner);
        let guard = inner.lock_controller();
        for _ in 0..3 {
            h.handle_frame(&peer, &Frame::PublishTransaction(genesis.clone()).encode().expect("encode"))
                .await
                .expect("publish");
        }
        drop(guard);
        h.flush_publishes().await.expect("flush");
        assert!(h.metrics().frames_dropped.with_label_values(&["queue_full"]).get() >= 1);
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn orphan_from_peer_requests_parents_and_can_be_cancelled() {
        let t = start(&["p1", "p2"]);
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        let signer = KeyPairSigner::from_seed(CurveId::Ed25519, &[5; 32]).expect("seed");
        let missing = TxHash::new([0x42; 32]);
        let mut tx = Transaction {
            nonce: 0,
            sender: signer.address(HashId::Blake3),
            recipient: t.bob,
            value: Amount::from(1u64),
            parents: vec![missing],
            gas_limit: 0,
            gas_price: 0,
            payload: Vec::new(),
            timestamp: t.clock.now(),
            sender_public_key: None,
            signature: None,
            hash: TxHash::ZERO,
        };
        tx.seal(HashId::Blake3);
        tx.sign(&signer).expect("sign");

        h.handle_frame(&peer, &Frame::PublishTransaction(tx.clone()).encode().expect("encode"))
            .await
            .expect("publish");
        h.flush_publishes().await.expect("flush");
        assert_eq!(h.orphan_count().await.expect("orphans"), 1);
        assert_eq!(t.transport.sent_to(&peer), vec![Frame::RequestTransaction(missing)]);
        assert!(t.transport.sent_to(&PeerId::new("p2")).is_empty());

        assert!(h.cancel_orphan(tx.hash).await.expect("cancel"));
        assert_eq!(h.orphan_count().await.expect("orphans"), 0);
        assert_eq!(h.peer_score(&peer).await.expect("score"), 0);
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_publish_notifies_source_only() {
        let t = start(&["p1", "p2"]);
        let h = t.node.handle();
        let peer = PeerId::new("p1");
        let signer = KeyPairSigner::from_seed(CurveId::Ed25519, &[5; 32]).expect("seed");
        let tip = h.best_tip().await.expect("tip");
        let mut tx = Transaction {
            nonce: 7,
            sender: signer.address(HashId::Blake3),
            recipient: t.bob,
            value: Amount::from(1u64),
            parents: vec![tip],
            gas_limit: 0,
            gas_price: 0,
            payload: Vec::new(),
            timestamp: t.clock.now(),
            sender_public_key: None,
            signature: None,
            hash: TxHash::ZERO,
        };
        tx.seal(HashId::Blake3);
        tx.sign(&signer).expect("sign");

        h.handle_frame(&peer, &Frame::PublishTransaction(tx.clone()).encode().expect("encode"))
            .await
            .expect("publish");
        h.flush_publishes().await.expect("flush");
        assert_eq!(t.transport.sent_to(&peer), vec![Frame::TransactionRejected(tx.hash)]);
        assert!(t.transport.sent_to(&PeerId::new("p2")).is_empty());
        assert_eq!(
            h.metrics()
                .transactions_rejected
                .with_label_values(&[ErrorKind::InvalidNonce.as_str()])
                .get(),
            1
        );
        t.node.shutdown().await;
    }

    #[tokio::test]
    async fn restart_on_another_network_is_refused() {
        let accounts = Arc::new(NullAccountStore::new());
        let store = Arc::new(NullDagStore::new());
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);
        let config = NodeConfig {
            identifier: "unit".into(),
            ..NodeConfig::default()
        };
        let node = DagNode::with_store(
            Arc::clone(&store),
            config.clone(),
            network(alice, bob),
            Arc::new(NullTransport::new()),
            accounts.clone(),
            Arc::new(NullClock::from_secs(1)),
        )
        .expect("first start");
        node.shutdown().await;

        let mut other = network(alice, bob);
        other.alloc.insert(bob, Amount::from(5u64));
        let err = DagNode::with_store(
            store,
            config,
            other,
            Arc::new(NullTransport::new()),
            accounts,
            Arc::new(NullClock::from_secs(1)),
        )
        .err()
        .expect("mismatch");
        assert!(matches!(err, NodeError::NetworkMismatch(_)));
    }
}
