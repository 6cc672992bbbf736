//! Admission controller: the only writer to the DAG store.
//!
//! Every submission is validated against a fresh snapshot and, if valid,
//! committed. Transactions missing parents are parked in the [`OrphanPool`]
//! and re-admitted (possibly in a cascade) as their parents arrive. The
//! controller never performs I/O itself; it returns [`Effect`]s for the
//! gossip layer to deliver.
//!
//! Callers serialize access (the node keeps the controller behind a mutex),
//! which makes the admission order a total order per network.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use dagnet_ledger::{
    AdmissionCheck, Deadline, ErrorKind, LedgerError, ValidationContext, Validator,
};
use dagnet_store::{DagSnapshot, DagStore, StoreError};
use dagnet_transactions::Transaction;
use dagnet_types::{Clock, PeerId, PublicKey, TxHash};

use crate::metrics::NodeMetrics;
use crate::orphans::{InsertResult, Orphan, OrphanPool};
use crate::reputation::{PenaltyReason, Reputation, ACCEPT_REWARD};
use crate::NodeError;

/// Where a submission came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// Created or submitted on this node.
    Local,
    Peer(PeerId),
}

impl Source {
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            Source::Peer(p) => Some(p),
            Source::Local => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local => f.write_str("local"),
            Source::Peer(p) => write!(f, "peer:{p}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Accepted,
    Rejected(ErrorKind),
    /// Parked until these parents are admitted.
    Deferred(Vec<TxHash>),
}

/// Work for the gossip layer produced by an admission.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Publish to every peer except `exclude`. Emitted once per admitted
    /// transaction.
    Broadcast { tx: Transaction, exclude: Option<PeerId> },
    /// Ask the peer that sent an orphan for its missing parents.
    RequestParents { peer: PeerId, hashes: Vec<TxHash> },
    /// Tell a peer its transaction was rejected, without saying why.
    NotifyRejected { peer: PeerId, hash: TxHash },
}

#[derive(Debug)]
pub struct AdmissionReport {
    /// Outcome for the submitted transaction itself.
    pub outcome: AdmissionOutcome,
    /// Every hash committed by this call in commit order, cascaded orphans
    /// included.
    pub admitted: Vec<TxHash>,
    pub effects: Vec<Effect>,
}

pub struct AdmissionController<S, V = Validator> {
    store: Arc<S>,
    validator: V,
    clock: Arc<dyn Clock>,
    orphans: OrphanPool,
    reputation: Reputation,
    metrics: Arc<NodeMetrics>,
    peer_count: usize,
}

impl<S: DagStore, V: AdmissionCheck> AdmissionController<S, V> {
    pub fn new(
        store: Arc<S>,
        validator: V,
        clock: Arc<dyn Clock>,
        orphans: OrphanPool,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            store,
            validator,
            clock,
            orphans,
            reputation: Reputation::new(),
            metrics,
            peer_count: 1,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn orphans(&self) -> &OrphanPool {
        &self.orphans
    }

    pub fn reputation(&self) -> &Reputation {
        &self.reputation
    }

    /// Connected peers, used to size the per-source orphan quota.
    pub fn set_peer_count(&mut self, peers: usize) {
        self.peer_count = peers;
    }

    pub fn is_banned(&mut self, peer: &PeerId) -> bool {
        let now = self.clock.now();
        self.reputation.is_banned(peer, now)
    }

    pub fn penalize(&mut self, peer: &PeerId, reason: PenaltyReason) -> bool {
        let now = self.clock.now();
        self.reputation.penalize(peer, reason, now)
    }

    /// Validate and commit `tx`, then re-admit any orphans it unblocks.
    ///
    /// `public_key` is used when `tx` does not carry its sender's key. Only
    /// store corruption is returned as an error; everything else is an
    /// outcome.
    pub fn admit(
        &mut self,
        tx: Transaction,
        source: Source,
        public_key: Option<PublicKey>,
        deadline: &Deadline,
    ) -> Result<AdmissionReport, NodeError> {
        let started = Instant::now();
        let mut report = AdmissionReport {
            outcome: AdmissionOutcome::Accepted,
            admitted: Vec::new(),
            effects: Vec::new(),
        };
        report.outcome = self.admit_one(tx, source, public_key, deadline, &mut report)?;

        let mut next = 0;
        while let Some(parent) = report.admitted.get(next).copied() {
            next += 1;
            self.orphan_resolved(parent, deadline, &mut report)?;
        }

        self.metrics.orphan_count.set(self.orphans.len() as i64);
        self.metrics
            .admission_latency_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        Ok(report)
    }

    /// Drop orphans past their TTL and score down their sources.
    pub fn sweep_orphans(&mut self) -> usize {
        let now = self.clock.now();
        let expired = self.orphans.expire(now);
        for orphan in &expired {
            debug!(hash = %orphan.tx.hash, source = %orphan.source, "orphan expired");
            if let Some(peer) = orphan.source.peer() {
                self.reputation.penalize(peer, PenaltyReason::ExpiredOrphan, now);
            }
        }
        self.metrics.orphans_expired.inc_by(expired.len() as u64);
        self.metrics.orphan_count.set(self.orphans.len() as i64);
        expired.len()
    }

    /// Release a pending orphan without touching its source's reputation.
    pub fn cancel_orphan(&mut self, hash: &TxHash) -> bool {
        let released = self.orphans.cancel(hash).is_some();
        self.metrics.orphan_count.set(self.orphans.len() as i64);
        released
    }

    /// Re-admit the orphans that were waiting only on `parent`.
    ///
    /// Each orphan gets the caller's budget afresh: it has already left the
    /// pool, so running out of time here would lose it.
    fn orphan_resolved(
        &mut self,
        parent: TxHash,
        deadline: &Deadline,
        report: &mut AdmissionReport,
    ) -> Result<(), NodeError> {
        for orphan in self.orphans.resolve(&parent) {
            let hash = orphan.tx.hash;
            let outcome = self.admit_one(
                orphan.tx,
                orphan.source,
                orphan.public_key,
                &deadline.renewed(),
                report,
            )?;
            debug!(hash = %hash, parent = %parent, ?outcome, "orphan re-admitted");
        }
        Ok(())
    }

    fn admit_one(
        &mut self,
        tx: Transaction,
        source: Source,
        public_key: Option<PublicKey>,
        deadline: &Deadline,
        report: &mut AdmissionReport,
    ) -> Result<AdmissionOutcome, NodeError> {
        let now = self.clock.now();
        let ctx = ValidationContext {
            now,
            public_key: public_key.clone(),
            deadline: deadline.clone(),
        };
        // The snapshot must be gone before the write below.
        let verdict = self
            .store
            .snapshot()
            .map_err(LedgerError::from)
            .and_then(|snapshot| self.validator.validate(&snapshot, &tx, &ctx));

        let verdict = match verdict {
            Ok(()) => self.commit(&tx),
            Err(e) => Err(e),
        };

        match verdict {
            Ok(()) => {
                debug!(hash = %tx.hash, source = %source, "transaction admitted");
                self.metrics.transactions_admitted.inc();
                self.metrics.transaction_count.inc();
                if let Some(peer) = source.peer() {
                    self.reputation.reward(peer, ACCEPT_REWARD);
                }
                report.admitted.push(tx.hash);
                report.effects.push(Effect::Broadcast {
                    exclude: source.peer().cloned(),
                    tx,
                });
                Ok(AdmissionOutcome::Accepted)
            }
            Err(LedgerError::MissingParents { hashes }) => {
                Ok(self.defer(tx, source, public_key, hashes, now, report))
            }
            Err(e @ LedgerError::StoreCorruption(_)) => {
                error!(hash = %tx.hash, error = %e, "store corruption during admission");
                Err(e.into())
            }
            Err(e) => {
                let kind = e.kind();
                if e.is_peer_fault() {
                    warn!(hash = %tx.hash, source = %source, error = %e, "transaction rejected");
                } else {
                    debug!(hash = %tx.hash, source = %source, error = %e, "transaction rejected");
                }
                self.metrics.record_rejection(kind);
                if let (Some(peer), true) = (source.peer(), e.is_peer_fault()) {
                    self.reputation
                        .penalize(peer, PenaltyReason::RejectedTransaction, now);
                    report.effects.push(Effect::NotifyRejected {
                        peer: peer.clone(),
                        hash: tx.hash,
                    });
                }
                Ok(AdmissionOutcome::Rejected(kind))
            }
        }
    }

    fn commit(&self, tx: &Transaction) -> Result<(), LedgerError> {
        match self.store.put(tx) {
            Ok(()) => Ok(()),
            Err(StoreError::Duplicate(_)) => Err(LedgerError::DuplicateTransaction(tx.hash)),
            Err(e) => {
                error!(hash = %tx.hash, error = %e, "commit failed");
                Err(e.into())
            }
        }
    }

    fn defer(
        &mut self,
        tx: Transaction,
        source: Source,
        public_key: Option<PublicKey>,
        hashes: Vec<TxHash>,
        now: dagnet_types::Timestamp,
        report: &mut AdmissionReport,
    ) -> AdmissionOutcome {
        debug!(hash = %tx.hash, source = %source, missing = hashes.len(), "transaction deferred");
        self.metrics.transactions_deferred.inc();
        let orphan = Orphan {
            tx,
            source: source.clone(),
            public_key,
            received_at: now,
        };
        if let InsertResult::Inserted { evicted } =
            self.orphans.insert(orphan, &hashes, self.peer_count)
        {
            for e in &evicted {
                debug!(hash = %e.tx.hash, source = %e.source, "orphan evicted");
            }
            self.metrics.orphans_evicted.inc_by(evicted.len() as u64);
            if let Some(peer) = source.peer() {
                report.effects.push(Effect::RequestParents {
                    peer: peer.clone(),
                    hashes: hashes.clone(),
                });
            }
        }
        AdmissionOutcome::Deferred(hashes)
    }

    /// Current store size, for the transaction-count gauge.
    pub fn refresh_gauges(&self) -> Result<(), NodeError> {
        let count = self
            .store
            .snapshot()
            .and_then(|s| s.transaction_count())?;
        self.metrics.transaction_count.set(count as i64);
        self.metrics.orphan_count.set(self.orphans.len() as i64);
        Ok(())
    }
}
