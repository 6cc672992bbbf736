//! Errors raised while constructing or parsing fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid {what} length: expected {expected}, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("non-minimal integer encoding")]
    NonMinimalInteger,

    #[error("unknown hash function: {0}")]
    UnknownHashId(String),

    #[error("unknown curve: {0}")]
    UnknownCurve(String),
}
