//! Orphan pool: holds transactions whose parents are not yet stored.
//!
//! Each orphan is indexed under every parent it is still missing. When a
//! transaction is admitted, the orphans waiting on it drop that parent from
//! their missing set; those left with none are handed back for admission.
//!
//! The pool is bounded three ways: a total capacity (oldest evicted first),
//! a per-source quota of `capacity / peers` so one peer cannot crowd out the
//! rest, and a TTL after which an orphan is dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use dagnet_transactions::Transaction;
use dagnet_types::{PublicKey, Timestamp, TxHash};

use crate::admission::Source;

/// A transaction waiting for its parents.
#[derive(Clone, Debug)]
pub struct Orphan {
    pub tx: Transaction,
    pub source: Source,
    /// Key supplied alongside the submission, if the transaction carries none.
    pub public_key: Option<PublicKey>,
    pub received_at: Timestamp,
}

#[derive(Debug)]
struct Entry {
    orphan: Orphan,
    missing: BTreeSet<TxHash>,
    seq: u64,
}

#[derive(Debug)]
pub enum InsertResult {
    Inserted { evicted: Vec<Orphan> },
    /// Already waiting; the original wait (and TTL) is kept.
    AlreadyPending,
}

#[derive(Debug)]
pub struct OrphanPool {
    entries: HashMap<TxHash, Entry>,
    /// missing parent → orphans waiting on it
    waiting_on: HashMap<TxHash, BTreeSet<TxHash>>,
    /// arrival sequence → orphan, oldest first
    arrival: BTreeMap<u64, TxHash>,
    per_source: HashMap<Source, usize>,
    capacity: usize,
    ttl: Duration,
    next_seq: u64,
}

impl OrphanPool {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            waiting_on: HashMap::new(),
            arrival: BTreeMap::new(),
            per_source: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Parents `hash` is still waiting for.
    pub fn missing_parents(&self, hash: &TxHash) -> Option<Vec<TxHash>> {
        self.entries
            .get(hash)
            .map(|e| e.missing.iter().copied().collect())
    }

    /// Per-source quota given the current number of connected peers.
    pub fn quota(&self, peers: usize) -> usize {
        (self.capacity / peers.max(1)).max(1)
    }

    pub fn source_count(&self, source: &Source) -> usize {
        self.per_source.get(source).copied().unwrap_or(0)
    }

    /// Park `orphan` until every hash in `missing` has been admitted.
    pub fn insert(&mut self, orphan: Orphan, missing: &[TxHash], peers: usize) -> InsertResult {
        let hash = orphan.tx.hash;
        if self.entries.contains_key(&hash) {
            return InsertResult::AlreadyPending;
        }

        let mut evicted = Vec::new();
        if self.source_count(&orphan.source) >= self.quota(peers) {
            if let Some(oldest) = self.oldest_from(&orphan.source) {
                evicted.extend(self.remove(&oldest));
            }
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.arrival.values().next().copied() else {
                break;
            };
            evicted.extend(self.remove(&oldest));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let missing: BTreeSet<TxHash> = missing.iter().copied().collect();
        for parent in &missing {
            self.waiting_on.entry(*parent).or_default().insert(hash);
        }
        *self.per_source.entry(orphan.source.clone()).or_default() += 1;
        self.arrival.insert(seq, hash);
        self.entries.insert(hash, Entry { orphan, missing, seq });
        InsertResult::Inserted { evicted }
    }

    /// `parent` has been admitted. Returns the orphans that no longer miss
    /// anything, in arrival order.
    pub fn resolve(&mut self, parent: &TxHash) -> Vec<Orphan> {
        let Some(waiting) = self.waiting_on.remove(parent) else {
            return Vec::new();
        };
        let mut ready: Vec<(u64, TxHash)> = Vec::new();
        for hash in waiting {
            if let Some(entry) = self.entries.get_mut(&hash) {
                entry.missing.remove(parent);
                if entry.missing.is_empty() {
                    ready.push((entry.seq, hash));
                }
            }
        }
        ready.sort_unstable();
        ready
            .into_iter()
            .filter_map(|(_, hash)| self.remove(&hash))
            .collect()
    }

    /// Drop every orphan that has waited at least the TTL.
    pub fn expire(&mut self, now: Timestamp) -> Vec<Orphan> {
        let expired: Vec<TxHash> = self
            .arrival
            .values()
            .filter(|h| {
                self.entries
                    .get(*h)
                    .is_some_and(|e| e.orphan.received_at.elapsed_until(now) >= self.ttl)
            })
            .copied()
            .collect();
        expired.iter().filter_map(|h| self.remove(h)).collect()
    }

    /// Release a pending orphan's slot.
    pub fn cancel(&mut self, hash: &TxHash) -> Option<Orphan> {
        self.remove(hash)
    }

    fn oldest_from(&self, source: &Source) -> Option<TxHash> {
        self.arrival
            .values()
            .find(|h| self.entries.get(*h).is_some_and(|e| &e.orphan.source == source))
            .copied()
    }

    fn remove(&mut self, hash: &TxHash) -> Option<Orphan> {
        let entry = self.entries.remove(hash)?;
        for parent in &entry.missing {
            if let Some(set) = self.waiting_on.get_mut(parent) {
                set.remove(hash);
                if set.is_empty() {
                    self.waiting_on.remove(parent);
                }
            }
        }
        self.arrival.remove(&entry.seq);
        if let Some(n) = self.per_source.get_mut(&entry.orphan.source) {
            *n -= 1;
            if *n == 0 {
                self.per_source.remove(&entry.orphan.source);
            }
        }
        Some(entry.orphan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagnet_types::{Address, Amount, PeerId};

    fn tx(seed: u8) -> Transaction {
        Transaction {
            nonce: 0,
            sender: Address::new([1; 20]),
            recipient: Address::new([2; 20]),
            value: Amount::from(1u64),
            parents: vec![TxHash::new([0xF0; 32])],
            gas_limit: 0,
            gas_price: 0,
            payload: Vec::new(),
            timestamp: Timestamp::from_nanos(1),
            sender_public_key: None,
            signature: None,
            hash: TxHash::new([seed; 32]),
        }
    }

    fn orphan(seed: u8, source: &Source, at_secs: u64) -> Orphan {
        Orphan {
            tx: tx(seed),
            source: source.clone(),
            public_key: None,
            received_at: Timestamp::from_nanos(at_secs * 1_000_000_000),
        }
    }

    fn peer(name: &str) -> Source {
        Source::Peer(PeerId::new(name))
    }

    fn h(b: u8) -> TxHash {
        TxHash::new([b; 32])
    }

    #[test]
    fn released_only_when_every_parent_arrives() {
        let mut pool = OrphanPool::new(10, Duration::from_secs(60));
        pool.insert(orphan(1, &peer("a"), 0), &[h(0xA0), h(0xA1)], 1);
        assert!(pool.resolve(&h(0xA0)).is_empty());
        assert_eq!(pool.missing_parents(&h(1)), Some(vec![h(0xA1)]));
        let ready = pool.resolve(&h(0xA1));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].tx.hash, h(1));
        assert!(pool.is_empty());
    }

    #[test]
    fn dependents_come_back_in_arrival_order() {
        let mut pool = OrphanPool::new(10, Duration::from_secs(60));
        for seed in [5, 3, 9] {
            pool.insert(orphan(seed, &peer("a"), 0), &[h(0xA0)], 1);
        }
        let order: Vec<_> = pool.resolve(&h(0xA0)).iter().map(|o| o.tx.hash).collect();
        assert_eq!(order, vec![h(5), h(3), h(9)]);
    }

    #[test]
    fn full_pool_evicts_oldest() {
        let mut pool = OrphanPool::new(2, Duration::from_secs(60));
        pool.insert(orphan(1, &peer("a"), 0), &[h(0xA0)], 1);
        pool.insert(orphan(2, &peer("b"), 0), &[h(0xA0)], 1);
        match pool.insert(orphan(3, &peer("c"), 0), &[h(0xA0)], 1) {
            InsertResult::Inserted { evicted } => {
                assert_eq!(evicted.len(), 1);
                assert_eq!(evicted[0].tx.hash, h(1));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&h(1)));
    }

    #[test]
    fn per_source_quota_evicts_own_oldest() {
        // capacity 4 across 2 peers → 2 each
        let mut pool = OrphanPool::new(4, Duration::from_secs(60));
        let a = peer("a");
        pool.insert(orphan(1, &peer("b"), 0), &[h(0xA0)], 2);
        pool.insert(orphan(2, &a, 0), &[h(0xA0)], 2);
        pool.insert(orphan(3, &a, 0), &[h(0xA0)], 2);
        match pool.insert(orphan(4, &a, 0), &[h(0xA0)], 2) {
            InsertResult::Inserted { evicted } => {
                assert_eq!(evicted.len(), 1);
                assert_eq!(evicted[0].tx.hash, h(2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(pool.contains(&h(1)), "other peer's orphan untouched");
        assert_eq!(pool.source_count(&a), 2);
    }

    #[test]
    fn quota_never_drops_below_one() {
        let pool = OrphanPool::new(3, Duration::from_secs(60));
        assert_eq!(pool.quota(0), 3);
        assert_eq!(pool.quota(10), 1);
    }

    #[test]
    fn expiry_and_fresh_wait_on_resubmission() {
        let mut pool = OrphanPool::new(10, Duration::from_secs(60));
        pool.insert(orphan(1, &peer("a"), 0), &[h(0xA0)], 1);
        pool.insert(orphan(2, &peer("a"), 30), &[h(0xA0)], 1);
        assert!(pool.expire(Timestamp::from_nanos(59_000_000_000)).is_empty());
        let expired = pool.expire(Timestamp::from_nanos(60_000_000_000));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].tx.hash, h(1));

        // resubmitted after expiry it waits afresh
        assert!(matches!(
            pool.insert(orphan(1, &peer("a"), 60), &[h(0xA0)], 1),
            InsertResult::Inserted { .. }
        ));
        let expired = pool.expire(Timestamp::from_nanos(100_000_000_000));
        assert_eq!(expired.len(), 1, "only the 30s orphan is stale by now");
        assert!(pool.contains(&h(1)));
    }

    #[test]
    fn duplicate_insert_keeps_first_wait() {
        let mut pool = OrphanPool::new(10, Duration::from_secs(60));
        pool.insert(orphan(1, &peer("a"), 0), &[h(0xA0)], 1);
        assert!(matches!(
            pool.insert(orphan(1, &peer("b"), 50), &[h(0xA0)], 1),
            InsertResult::AlreadyPending
        ));
        assert_eq!(pool.expire(Timestamp::from_nanos(60_000_000_000)).len(), 1);
    }

    #[test]
    fn cancel_releases_slot_and_index() {
        let mut pool = OrphanPool::new(10, Duration::from_secs(60));
        let a = peer("a");
        pool.insert(orphan(1, &a, 0), &[h(0xA0)], 1);
        assert!(pool.cancel(&h(1)).is_some());
        assert_eq!(pool.source_count(&a), 0);
        assert!(pool.resolve(&h(0xA0)).is_empty());
        assert!(pool.cancel(&h(1)).is_none());
    }
}
