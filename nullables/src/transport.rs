//! Nullable transport: record frames without sending them.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use dagnet_messages::{Frame, PeerTransport, TransportError};
use dagnet_types::PeerId;

/// A test transport that records frames instead of sending them.
///
/// Sends to a peer that is not connected fail with `UnknownPeer`, which lets
/// tests exercise the best-effort delivery path.
#[derive(Default)]
pub struct NullTransport {
    peers: Mutex<BTreeSet<PeerId>>,
    sent: Mutex<Vec<(PeerId, Frame)>>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peers(peers: impl IntoIterator<Item = PeerId>) -> Self {
        let t = Self::new();
        for p in peers {
            t.connect(p);
        }
        t
    }

    pub fn connect(&self, peer: PeerId) {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner).insert(peer);
    }

    pub fn disconnect(&self, peer: &PeerId) {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner).remove(peer);
    }

    /// Every frame sent so far, in send order (for assertions).
    pub fn sent(&self) -> Vec<(PeerId, Frame)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Frames sent to one peer.
    pub fn sent_to(&self, peer: &PeerId) -> Vec<Frame> {
        self.sent()
            .into_iter()
            .filter(|(p, _)| p == peer)
            .map(|(_, f)| f)
            .collect()
    }

    /// Drain recorded frames.
    pub fn take_sent(&self) -> Vec<(PeerId, Frame)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl PeerTransport for NullTransport {
    async fn send(&self, peer: &PeerId, frame: Frame) -> Result<(), TransportError> {
        if !self.peers.lock().unwrap_or_else(PoisonError::into_inner).contains(peer) {
            return Err(TransportError::UnknownPeer(peer.clone()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((peer.clone(), frame));
        Ok(())
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
