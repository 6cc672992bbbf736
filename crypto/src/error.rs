use dagnet_types::CurveId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key for {0}")]
    InvalidPrivateKey(CurveId),

    #[error("invalid public key for {0}")]
    InvalidPublicKey(CurveId),

    #[error("no valid {0} scalar could be derived from seed")]
    SeedExhausted(CurveId),
}
