//! Reading and writing the `meta` database.

use heed::types::Bytes;
use heed::{Database, RoTxn, RwTxn};

use dagnet_store::meta::{META_CURVE_ID, META_GENESIS, META_HASH_ID, META_IDENTIFIER, META_VERSION};
use dagnet_store::StoreMeta;

use crate::keys::hash_from;
use crate::LmdbError;

fn get_str(db: &Database<Bytes, Bytes>, txn: &RoTxn, key: &str) -> Result<Option<String>, LmdbError> {
    match db.get(txn, key.as_bytes())? {
        Some(bytes) => String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| LmdbError::Serialization(format!("meta key '{key}': {e}"))),
        None => Ok(None),
    }
}

/// Stored schema version. `None` when the store has never been stamped.
pub(crate) fn read_version(db: &Database<Bytes, Bytes>, txn: &RoTxn) -> Result<Option<u32>, LmdbError> {
    match db.get(txn, META_VERSION.as_bytes())? {
        Some(bytes) => {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                LmdbError::Serialization("version has unexpected byte length".to_string())
            })?;
            Ok(Some(u32::from_be_bytes(arr)))
        }
        None => Ok(None),
    }
}

pub(crate) fn write_version(
    db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn,
    version: u32,
) -> Result<(), LmdbError> {
    db.put(wtxn, META_VERSION.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

/// The header, or `None` for a fresh store. A header with no version key
/// reads as version 0.
pub(crate) fn read_meta(db: &Database<Bytes, Bytes>, txn: &RoTxn) -> Result<Option<StoreMeta>, LmdbError> {
    let Some(genesis) = db.get(txn, META_GENESIS.as_bytes())? else {
        return Ok(None);
    };
    let genesis = hash_from(genesis)?;
    let missing = |key: &str| LmdbError::Serialization(format!("meta key '{key}' missing"));

    let hash_id = get_str(db, txn, META_HASH_ID)?
        .ok_or_else(|| missing(META_HASH_ID))?
        .parse()
        .map_err(|e: dagnet_types::TypesError| LmdbError::Serialization(e.to_string()))?;
    let curve_id = get_str(db, txn, META_CURVE_ID)?
        .ok_or_else(|| missing(META_CURVE_ID))?
        .parse()
        .map_err(|e: dagnet_types::TypesError| LmdbError::Serialization(e.to_string()))?;
    let identifier = get_str(db, txn, META_IDENTIFIER)?.ok_or_else(|| missing(META_IDENTIFIER))?;
    let version = read_version(db, txn)?.unwrap_or(0);

    Ok(Some(StoreMeta {
        genesis,
        hash_id,
        curve_id,
        identifier,
        version,
    }))
}

pub(crate) fn write_meta(
    db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn,
    meta: &StoreMeta,
) -> Result<(), LmdbError> {
    db.put(wtxn, META_GENESIS.as_bytes(), meta.genesis.as_bytes())?;
    db.put(wtxn, META_HASH_ID.as_bytes(), meta.hash_id.as_str().as_bytes())?;
    db.put(wtxn, META_CURVE_ID.as_bytes(), meta.curve_id.as_str().as_bytes())?;
    db.put(wtxn, META_IDENTIFIER.as_bytes(), meta.identifier.as_bytes())?;
    write_version(db, wtxn, meta.version)
}
