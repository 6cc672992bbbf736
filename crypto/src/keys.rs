//! Key generation for every supported curve.

use dagnet_types::{CurveId, KeyPair, PrivateKey, PublicKey};
use p521::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

const SEED_CONTEXT: &str = "dagnet 2024 keypair-from-seed v1";
const MAX_SEED_ATTEMPTS: u32 = 64;

/// Generate a new key pair from a secure random source.
pub fn generate_keypair(curve: CurveId) -> Result<KeyPair, CryptoError> {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    keypair_from_seed(curve, &seed)
}

/// Derive a key pair from a 32-byte seed (deterministic).
///
/// Ed25519 uses the seed as the secret key directly. The NIST curves expand
/// the seed with the BLAKE3 XOF and retry with a counter until the candidate
/// is a valid scalar.
pub fn keypair_from_seed(curve: CurveId, seed: &[u8; 32]) -> Result<KeyPair, CryptoError> {
    let private = match curve {
        CurveId::Ed25519 => PrivateKey(seed.to_vec()),
        CurveId::P256 | CurveId::P521 => {
            let mut found = None;
            for counter in 0..MAX_SEED_ATTEMPTS {
                let candidate = expand_seed(seed, counter, curve.scalar_len());
                if scalar_is_valid(curve, &candidate) {
                    found = Some(PrivateKey(candidate));
                    break;
                }
            }
            found.ok_or(CryptoError::SeedExhausted(curve))?
        }
    };
    let public = public_from_private(curve, &private)?;
    Ok(KeyPair {
        curve,
        public,
        private,
    })
}

/// Derive the marshalled public key from a private key.
pub fn public_from_private(curve: CurveId, private: &PrivateKey) -> Result<PublicKey, CryptoError> {
    match curve {
        CurveId::Ed25519 => {
            let bytes: [u8; 32] = private
                .as_bytes()
                .try_into()
                .map_err(|_| CryptoError::InvalidPrivateKey(curve))?;
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&bytes);
            Ok(PublicKey(signing_key.verifying_key().to_bytes().to_vec()))
        }
        CurveId::P256 => {
            let signing_key = p256::ecdsa::SigningKey::from_slice(private.as_bytes())
                .map_err(|_| CryptoError::InvalidPrivateKey(curve))?;
            let point = signing_key.verifying_key().to_encoded_point(true);
            Ok(PublicKey(point.as_bytes().to_vec()))
        }
        CurveId::P521 => {
            // The P-521 ECDSA key is a thin wrapper; derive from the scalar.
            let secret = p521::SecretKey::from_slice(private.as_bytes())
                .map_err(|_| CryptoError::InvalidPrivateKey(curve))?;
            let point = secret.public_key().to_encoded_point(true);
            Ok(PublicKey(point.as_bytes().to_vec()))
        }
    }
}

fn expand_seed(seed: &[u8; 32], counter: u32, len: usize) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_derive_key(SEED_CONTEXT);
    hasher.update(seed);
    hasher.update(&counter.to_be_bytes());
    let mut out = vec![0u8; len];
    hasher.finalize_xof().fill(&mut out);
    if len == 66 {
        // P-521 scalars occupy 521 bits; clear the padding above bit 520.
        out[0] &= 0x01;
    }
    out
}

fn scalar_is_valid(curve: CurveId, bytes: &[u8]) -> bool {
    match curve {
        CurveId::P256 => p256::ecdsa::SigningKey::from_slice(bytes).is_ok(),
        CurveId::P521 => p521::SecretKey::from_slice(bytes).is_ok(),
        CurveId::Ed25519 => bytes.len() == 32,
    }
}
