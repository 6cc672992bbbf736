//! Digest signing and verification.
//!
//! ECDSA signatures use RFC 6979 deterministic nonces, so signing the same
//! digest with the same key always yields the same `(r, s)`.

use dagnet_types::{CurveId, PrivateKey, PublicKey, Signature};
use ed25519_dalek::Signer as _;
use p256::ecdsa::signature::{Signer as _, Verifier as _};

use crate::error::CryptoError;

/// Sign a 32-byte digest, embedding the digest in the returned signature.
pub fn sign_digest(
    curve: CurveId,
    private_key: &PrivateKey,
    digest: &[u8; 32],
) -> Result<Signature, CryptoError> {
    let rs: Vec<u8> = match curve {
        CurveId::Ed25519 => {
            let bytes: [u8; 32] = private_key
                .as_bytes()
                .try_into()
                .map_err(|_| CryptoError::InvalidPrivateKey(curve))?;
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&bytes);
            signing_key.sign(digest).to_bytes().to_vec()
        }
        CurveId::P256 => {
            let signing_key = p256::ecdsa::SigningKey::from_slice(private_key.as_bytes())
                .map_err(|_| CryptoError::InvalidPrivateKey(curve))?;
            let sig: p256::ecdsa::Signature = signing_key.sign(digest);
            sig.to_bytes().to_vec()
        }
        CurveId::P521 => {
            let signing_key = p521::ecdsa::SigningKey::from_slice(private_key.as_bytes())
                .map_err(|_| CryptoError::InvalidPrivateKey(curve))?;
            let sig: p521::ecdsa::Signature = signing_key.sign(digest);
            sig.to_bytes().to_vec()
        }
    };
    let (r, s) = rs.split_at(curve.scalar_len());
    Ok(Signature {
        curve,
        digest: *digest,
        r: r.to_vec(),
        s: s.to_vec(),
    })
}

/// Verify `signature` over `digest` under `public_key` for `curve`.
///
/// Returns `false` on any mismatch: wrong curve, a signature that embeds a
/// different digest, malformed key or scalar bytes, or a failed check.
pub fn verify_digest(
    curve: CurveId,
    public_key: &PublicKey,
    digest: &[u8; 32],
    signature: &Signature,
) -> bool {
    if signature.curve != curve || signature.digest != *digest {
        return false;
    }
    let width = curve.scalar_len();
    if signature.r.len() != width || signature.s.len() != width {
        return false;
    }
    let rs = signature.to_rs_bytes();
    match curve {
        CurveId::Ed25519 => {
            let Ok(key_bytes) = <[u8; 32]>::try_from(public_key.as_bytes()) else {
                return false;
            };
            let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes) else {
                return false;
            };
            let Ok(sig) = ed25519_dalek::Signature::from_slice(&rs) else {
                return false;
            };
            verifying_key.verify_strict(digest, &sig).is_ok()
        }
        CurveId::P256 => {
            let Ok(verifying_key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key.as_bytes())
            else {
                return false;
            };
            let Ok(sig) = p256::ecdsa::Signature::from_slice(&rs) else {
                return false;
            };
            verifying_key.verify(digest, &sig).is_ok()
        }
        CurveId::P521 => {
            let Ok(verifying_key) = p521::ecdsa::VerifyingKey::from_sec1_bytes(public_key.as_bytes())
            else {
                return false;
            };
            let Ok(sig) = p521::ecdsa::Signature::from_slice(&rs) else {
                return false;
            };
            verifying_key.verify(digest, &sig).is_ok()
        }
    }
}
