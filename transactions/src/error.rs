use dagnet_crypto::CryptoError;
use dagnet_types::TxHash;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction is already signed")]
    AlreadySigned,

    #[error("transaction hash is not set")]
    NilHash,

    #[error("truncated encoding: {field} needs {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid {field} length: expected {expected}, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("non-minimal integer in {0}")]
    NonMinimalInteger(&'static str),

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("unknown curve tag {0:#04x}")]
    UnknownCurve(u8),

    #[error("{0} parents exceeds the maximum")]
    TooManyParents(usize),

    #[error("non-genesis transaction has no parents")]
    NoParents,

    #[error("genesis-shaped transaction has parents")]
    GenesisWithParents,

    #[error("duplicate parent {0}")]
    DuplicateParent(TxHash),

    #[error("payload of {0} bytes exceeds the maximum")]
    PayloadTooLarge(usize),

    #[error("hash mismatch: claimed {claimed}, computed {computed}")]
    HashMismatch { claimed: TxHash, computed: TxHash },

    #[error("signing failed: {0}")]
    Signing(#[from] CryptoError),
}
