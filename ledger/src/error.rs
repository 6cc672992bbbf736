use std::fmt;

use dagnet_store::StoreError;
use dagnet_types::{Amount, TxHash};
use thiserror::Error;

/// Everything the ledger can refuse or fail with.
///
/// Detailed variants are for local logs only. Peers are told no more than
/// that a transaction was rejected.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("duplicate transaction {0}")]
    DuplicateTransaction(TxHash),

    #[error("missing {} parent(s)", hashes.len())]
    MissingParents { hashes: Vec<TxHash> },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("no parent is a tip and not every parent is deep enough")]
    InvalidDepth,

    #[error("store already initialized")]
    AlreadyInitialized,

    #[error("not found: {0}")]
    NotFound(TxHash),

    #[error("store corruption: {0}")]
    StoreCorruption(String),

    #[error("cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyInitialized => LedgerError::AlreadyInitialized,
            StoreError::Corruption(msg) => LedgerError::StoreCorruption(msg),
            other => LedgerError::Storage(other),
        }
    }
}

/// Fieldless classification of a [`LedgerError`], used as a metrics label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidEncoding,
    DuplicateTransaction,
    MissingParents,
    InvalidTimestamp,
    InvalidSignature,
    InvalidNonce,
    InsufficientBalance,
    InvalidDepth,
    AlreadyInitialized,
    NotFound,
    StoreCorruption,
    Cancelled,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidEncoding => "invalid_encoding",
            Self::DuplicateTransaction => "duplicate_transaction",
            Self::MissingParents => "missing_parents",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidNonce => "invalid_nonce",
            Self::InsufficientBalance => "insufficient_balance",
            Self::InvalidDepth => "invalid_depth",
            Self::AlreadyInitialized => "already_initialized",
            Self::NotFound => "not_found",
            Self::StoreCorruption => "store_corruption",
            Self::Cancelled => "cancelled",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEncoding(_) => ErrorKind::InvalidEncoding,
            Self::DuplicateTransaction(_) => ErrorKind::DuplicateTransaction,
            Self::MissingParents { .. } => ErrorKind::MissingParents,
            Self::InvalidTimestamp(_) => ErrorKind::InvalidTimestamp,
            Self::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Self::InvalidNonce { .. } => ErrorKind::InvalidNonce,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::InvalidDepth => ErrorKind::InvalidDepth,
            Self::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StoreCorruption(_) => ErrorKind::StoreCorruption,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the sender of the offending transaction is at fault.
    ///
    /// Local failures (storage, cancellation) and recoverable states
    /// (missing parents) say nothing about the peer.
    pub fn is_peer_fault(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::MissingParents
                | ErrorKind::DuplicateTransaction
                | ErrorKind::Cancelled
                | ErrorKind::Storage
                | ErrorKind::StoreCorruption
                | ErrorKind::NotFound
                | ErrorKind::AlreadyInitialized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_ledger_kinds() {
        assert_eq!(
            LedgerError::from(StoreError::AlreadyInitialized).kind(),
            ErrorKind::AlreadyInitialized
        );
        assert_eq!(
            LedgerError::from(StoreError::Corruption("x".into())).kind(),
            ErrorKind::StoreCorruption
        );
        assert_eq!(
            LedgerError::from(StoreError::Backend("x".into())).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn peer_fault_classification() {
        assert!(LedgerError::InvalidDepth.is_peer_fault());
        assert!(LedgerError::InvalidNonce { expected: 1, got: 3 }.is_peer_fault());
        assert!(!LedgerError::MissingParents { hashes: vec![] }.is_peer_fault());
        assert!(!LedgerError::Cancelled.is_peer_fault());
    }

    #[test]
    fn display_carries_detail() {
        let e = LedgerError::InsufficientBalance {
            have: Amount::from(59u64),
            need: Amount::from(1001u64),
        };
        assert_eq!(e.to_string(), "insufficient balance: have 59, need 1001");
    }
}
