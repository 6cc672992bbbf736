use thiserror::Error;

use dagnet_ledger::LedgerError;
use dagnet_messages::{FrameError, TransportError};
use dagnet_store::StoreError;
use dagnet_store_lmdb::LmdbError;
use dagnet_types::Address;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("lmdb error: {0}")]
    Lmdb(#[from] LmdbError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("store belongs to another network: {0}")]
    NetworkMismatch(String),

    #[error("no signer for account {0}")]
    UnknownAccount(Address),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("admission queue closed")]
    QueueClosed,

    #[error("blocking task failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// `StoreCorruption` is fatal: the owner should flush logs and exit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NodeError::Ledger(LedgerError::StoreCorruption(_)))
    }
}

impl From<tokio::task::JoinError> for NodeError {
    fn from(e: tokio::task::JoinError) -> Self {
        NodeError::Join(e.to_string())
    }
}
