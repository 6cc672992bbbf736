//! Network parameters fixed at genesis.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::amount::Amount;
use crate::error::TypesError;

/// Descendant count at which a transaction is considered final by depth.
pub const DEFAULT_CONFIRMATION_DEPTH: u32 = 6;

/// The 256-bit hash function a network uses for transaction and address hashing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashId {
    /// Legacy networks.
    #[serde(rename = "sha3-256")]
    Sha3_256,
    /// Tree hash, the default for new networks.
    #[default]
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha3_256 => "sha3-256",
            Self::Blake3 => "blake3",
        }
    }
}

impl FromStr for HashId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha3-256" => Ok(Self::Sha3_256),
            "blake3" => Ok(Self::Blake3),
            other => Err(TypesError::UnknownHashId(other.to_string())),
        }
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signature scheme a network uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveId {
    #[serde(rename = "p256")]
    P256,
    #[serde(rename = "p521")]
    P521,
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl CurveId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P256 => "p256",
            Self::P521 => "p521",
            Self::Ed25519 => "ed25519",
        }
    }

    /// Tag byte used in the signature wire field.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::P256 => 1,
            Self::P521 => 2,
            Self::Ed25519 => 3,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::P256),
            2 => Some(Self::P521),
            3 => Some(Self::Ed25519),
            _ => None,
        }
    }

    /// Width in bytes of each of `r` and `s`.
    pub fn scalar_len(&self) -> usize {
        match self {
            Self::P256 | Self::Ed25519 => 32,
            Self::P521 => 66,
        }
    }
}

impl FromStr for CurveId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p256" => Ok(Self::P256),
            "p521" => Ok(Self::P521),
            "ed25519" => Ok(Self::Ed25519),
            other => Err(TypesError::UnknownCurve(other.to_string())),
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_confirmation_depth() -> u32 {
    DEFAULT_CONFIRMATION_DEPTH
}

/// Everything that identifies a network, as loaded from
/// `<data_dir>/config/<identifier>.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub identifier: String,
    pub network: u64,
    #[serde(default)]
    pub hash_id: HashId,
    pub curve_id: CurveId,
    /// K: descendants required for finality by depth.
    #[serde(default = "default_confirmation_depth")]
    pub confirmation_depth: u32,
    /// Initial balances. Iterates in byte-lexicographic address order.
    #[serde(default)]
    pub alloc: BTreeMap<Address, Amount>,
}

/// Opaque identity of a remote peer, assigned by the transport.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_config_json_shape() {
        let json = r#"{
            "identifier": "testnet",
            "network": 7,
            "hash_id": "sha3-256",
            "curve_id": "p256",
            "alloc": {
                "0000000000000000000000000000000000000002": "5",
                "0000000000000000000000000000000000000001": "100"
            }
        }"#;
        let cfg: NetworkConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.hash_id, HashId::Sha3_256);
        assert_eq!(cfg.curve_id, CurveId::P256);
        assert_eq!(cfg.confirmation_depth, DEFAULT_CONFIRMATION_DEPTH);
        let amounts: Vec<String> = cfg.alloc.values().map(|a| a.to_string()).collect();
        assert_eq!(amounts, vec!["100", "5"]);
    }

    #[test]
    fn hash_id_defaults_to_tree_hash() {
        let json = r#"{"identifier":"x","network":1,"curve_id":"ed25519"}"#;
        let cfg: NetworkConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.hash_id, HashId::Blake3);
        assert!(cfg.alloc.is_empty());
    }

    #[test]
    fn curve_byte_roundtrip() {
        for c in [CurveId::P256, CurveId::P521, CurveId::Ed25519] {
            assert_eq!(CurveId::from_byte(c.to_byte()), Some(c));
        }
        assert_eq!(CurveId::from_byte(0), None);
    }

    #[test]
    fn ids_parse_from_str() {
        assert_eq!("blake3".parse::<HashId>().unwrap(), HashId::Blake3);
        assert!("md5".parse::<HashId>().is_err());
        assert_eq!("p521".parse::<CurveId>().unwrap(), CurveId::P521);
    }
}
