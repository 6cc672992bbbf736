//! Outbound side of the gossip adapter.
//!
//! Turns admission [`Effect`]s and query answers into frames and hands them
//! to the [`PeerTransport`]. Delivery is best effort: a send that fails or
//! exceeds the request timeout is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use dagnet_messages::{Frame, PeerTransport};
use dagnet_transactions::Transaction;
use dagnet_types::{PeerId, TxHash};

use crate::admission::Effect;

#[derive(Clone)]
pub struct Gossip {
    transport: Arc<dyn PeerTransport>,
    send_timeout: Duration,
}

impl Gossip {
    pub fn new(transport: Arc<dyn PeerTransport>, send_timeout: Duration) -> Self {
        Self {
            transport,
            send_timeout,
        }
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.transport.peers()
    }

    pub fn peer_count(&self) -> usize {
        self.transport.peers().len()
    }

    pub async fn deliver(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Broadcast { tx, exclude } => self.broadcast(&tx, exclude.as_ref()).await,
                Effect::RequestParents { peer, hashes } => {
                    for hash in hashes {
                        self.send(&peer, Frame::RequestTransaction(hash)).await;
                    }
                }
                Effect::NotifyRejected { peer, hash } => {
                    self.send(&peer, Frame::TransactionRejected(hash)).await;
                }
            }
        }
    }

    /// Publish `tx` to every connected peer but `exclude`.
    pub async fn broadcast(&self, tx: &Transaction, exclude: Option<&PeerId>) {
        let peers = self.transport.peers();
        let mut sent = 0usize;
        for peer in peers.iter().filter(|p| Some(*p) != exclude) {
            if self.send(peer, Frame::PublishTransaction(tx.clone())).await {
                sent += 1;
            }
        }
        debug!(hash = %tx.hash, peers = sent, "transaction broadcast");
    }

    pub async fn request_transaction(&self, peer: &PeerId, hash: TxHash) -> bool {
        self.send(peer, Frame::RequestTransaction(hash)).await
    }

    /// Send one frame, returning whether the transport accepted it in time.
    pub async fn send(&self, peer: &PeerId, frame: Frame) -> bool {
        let tag = frame.tag();
        match tokio::time::timeout(self.send_timeout, self.transport.send(peer, frame)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(peer = %peer, ?tag, error = %e, "send failed");
                false
            }
            Err(_) => {
                debug!(peer = %peer, ?tag, "send timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagnet_nullables::NullTransport;
    use dagnet_types::{Address, Amount, Timestamp};

    fn tx() -> Transaction {
        Transaction {
            nonce: 0,
            sender: Address::new([1; 20]),
            recipient: Address::new([2; 20]),
            value: Amount::from(1u64),
            parents: vec![TxHash::new([3; 32])],
            gas_limit: 0,
            gas_price: 0,
            payload: Vec::new(),
            timestamp: Timestamp::from_nanos(1),
            sender_public_key: None,
            signature: None,
            hash: TxHash::new([4; 32]),
        }
    }

    fn gossip(transport: &Arc<NullTransport>) -> Gossip {
        Gossip::new(transport.clone(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn broadcast_skips_the_source() {
        let transport = Arc::new(NullTransport::with_peers([
            PeerId::new("a"),
            PeerId::new("b"),
            PeerId::new("c"),
        ]));
        gossip(&transport)
            .deliver(vec![Effect::Broadcast {
                tx: tx(),
                exclude: Some(PeerId::new("b")),
            }])
            .await;
        let targets: Vec<_> = transport.sent().into_iter().map(|(p, _)| p).collect();
        assert_eq!(targets, vec![PeerId::new("a"), PeerId::new("c")]);
    }

    #[tokio::test]
    async fn parent_requests_go_only_to_the_source() {
        let transport = Arc::new(NullTransport::with_peers([PeerId::new("a"), PeerId::new("b")]));
        let parents = vec![TxHash::new([7; 32]), TxHash::new([8; 32])];
        gossip(&transport)
            .deliver(vec![Effect::RequestParents {
                peer: PeerId::new("a"),
                hashes: parents.clone(),
            }])
            .await;
        assert_eq!(
            transport.sent_to(&PeerId::new("a")),
            vec![
                Frame::RequestTransaction(parents[0]),
                Frame::RequestTransaction(parents[1])
            ]
        );
        assert!(transport.sent_to(&PeerId::new("b")).is_empty());
    }

    #[tokio::test]
    async fn send_to_unknown_peer_is_swallowed() {
        let transport = Arc::new(NullTransport::new());
        assert!(!gossip(&transport).request_transaction(&PeerId::new("x"), TxHash::ZERO).await);
    }
}
