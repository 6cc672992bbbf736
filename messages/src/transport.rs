use async_trait::async_trait;
use thiserror::Error;

use dagnet_types::PeerId;

use crate::Frame;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("peer {0} is not connected")]
    UnknownPeer(PeerId),

    #[error("transport closed")]
    Closed,
}

/// Outbound side of the peer-to-peer transport.
///
/// Delivery is best-effort. Callers log failures and move on; nothing above
/// this trait retries.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, peer: &PeerId, frame: Frame) -> Result<(), TransportError>;

    /// Peers currently connected.
    fn peers(&self) -> Vec<PeerId>;
}
