//! The store header.

use dagnet_types::{CurveId, HashId, TxHash};

/// Keys of the `meta` map.
pub const META_GENESIS: &str = "genesis";
pub const META_HASH_ID: &str = "hash_id";
pub const META_CURVE_ID: &str = "curve_id";
pub const META_IDENTIFIER: &str = "identifier";
pub const META_VERSION: &str = "version";

/// Header written atomically with the genesis frontier.
///
/// An absent header means a fresh store that still needs genesis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreMeta {
    /// Hash of the last genesis transaction written; the network fingerprint.
    pub genesis: TxHash,
    pub hash_id: HashId,
    pub curve_id: CurveId,
    pub identifier: String,
    /// Schema version of the on-disk layout.
    pub version: u32,
}
