//! Startup integrity scan.
//!
//! Walks every stored transaction and index entry and checks that hashes
//! recompute, parents exist and precede their children, sender nonces are
//! gap-free, and the reverse indexes agree with the primary map. Optionally
//! re-verifies every signature. Findings are collected rather than failing
//! fast so an operator sees the whole picture.

use heed::RoTxn;

use dagnet_store::StoreMeta;
use dagnet_transactions::{check_well_formed, Transaction};
use dagnet_types::{Address, TxHash};

use crate::environment::LmdbEnvironment;
use crate::keys::{child_key, hash_from, nonce_from_sender_key, recipient_key};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub transactions_checked: u64,
    pub index_entries_checked: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

fn load(env: &LmdbEnvironment, txn: &RoTxn, hash: &TxHash) -> Result<Option<Transaction>, LmdbError> {
    match env.txs_db.get(txn, hash.as_bytes())? {
        Some(bytes) => Transaction::decode(bytes)
            .map(Some)
            .map_err(|e| LmdbError::Serialization(format!("{hash}: {e}"))),
        None => Ok(None),
    }
}

/// Check the store against its structural invariants.
///
/// `verify_signatures` additionally re-checks every non-genesis signature and
/// its binding to the sender address; this is the expensive part.
pub fn check_integrity(
    env: &LmdbEnvironment,
    verify_signatures: bool,
) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.env().read_txn()?;

    let Some(meta) = crate::meta::read_meta(&env.meta_db, &rtxn)? else {
        if env.txs_db.len(&rtxn)? > 0 {
            report
                .errors
                .push("transactions present but store header is missing".into());
        }
        return Ok(report);
    };

    check_transactions(env, &rtxn, &meta, verify_signatures, &mut report)?;
    check_sender_index(env, &rtxn, &mut report)?;
    check_recipient_index(env, &rtxn, &mut report)?;
    check_children_index(env, &rtxn, &mut report)?;

    match load(env, &rtxn, &meta.genesis)? {
        Some(tx) if tx.is_genesis() => {}
        Some(_) => report
            .errors
            .push(format!("genesis fingerprint {} is not a genesis transaction", meta.genesis)),
        None => report
            .errors
            .push(format!("genesis fingerprint {} is not stored", meta.genesis)),
    }

    if report.is_healthy() {
        tracing::info!(
            transactions = report.transactions_checked,
            index_entries = report.index_entries_checked,
            "store integrity check passed"
        );
    } else {
        tracing::error!(errors = report.errors.len(), "store integrity check failed");
    }
    Ok(report)
}

fn check_transactions(
    env: &LmdbEnvironment,
    rtxn: &RoTxn,
    meta: &StoreMeta,
    verify_signatures: bool,
    report: &mut IntegrityReport,
) -> Result<(), LmdbError> {
    let mut expected_children = 0u64;
    let mut childless = 0u64;

    for result in env.txs_db.iter(rtxn)? {
        let (key, bytes) = result?;
        report.transactions_checked += 1;
        let key = hash_from(key)?;
        let tx = match Transaction::decode(bytes) {
            Ok(tx) => tx,
            Err(e) => {
                report.errors.push(format!("{key}: undecodable: {e}"));
                continue;
            }
        };

        if tx.hash != key {
            report.errors.push(format!("{key}: stored under wrong key"));
        }
        if let Err(e) = check_well_formed(&tx, meta.hash_id) {
            report.errors.push(format!("{key}: {e}"));
        }

        for parent in &tx.parents {
            expected_children += 1;
            match load(env, rtxn, parent)? {
                Some(p) if p.timestamp > tx.timestamp => report
                    .errors
                    .push(format!("{key}: parent {parent} is newer than child")),
                Some(_) => {}
                None => report.errors.push(format!("{key}: parent {parent} missing")),
            }
            if env.children_db.get(rtxn, &child_key(parent, &key)[..])?.is_none() {
                report
                    .errors
                    .push(format!("{key}: children index lacks edge from {parent}"));
            }
        }

        let has_children = env.children_db.prefix_iter(rtxn, key.as_bytes())?.next().is_some();
        let is_tip = env.tips_db.get(rtxn, key.as_bytes())?.is_some();
        if !has_children {
            childless += 1;
        }
        if has_children == is_tip {
            report.errors.push(format!(
                "{key}: tip index says {is_tip} but transaction has children: {has_children}"
            ));
        }

        if env
            .by_recipient_db
            .get(rtxn, &recipient_key(&tx.recipient, &key)[..])?
            .is_none()
        {
            report.errors.push(format!("{key}: missing from recipient index"));
        }

        if verify_signatures && !tx.is_genesis() && !signature_binds(&tx, meta) {
            report.errors.push(format!("{key}: signature does not verify"));
        }
    }

    let children_entries = env.children_db.len(rtxn)?;
    if children_entries != expected_children {
        report.errors.push(format!(
            "children index has {children_entries} entries, expected {expected_children}"
        ));
    }
    let tips = env.tips_db.len(rtxn)?;
    if tips != childless {
        report
            .errors
            .push(format!("tip index has {tips} entries, expected {childless}"));
    }
    Ok(())
}

fn signature_binds(tx: &Transaction, meta: &StoreMeta) -> bool {
    let (Some(pk), Some(sig)) = (&tx.sender_public_key, &tx.signature) else {
        return false;
    };
    dagnet_crypto::address_of(meta.hash_id, pk) == tx.sender
        && dagnet_crypto::verify_digest(meta.curve_id, pk, tx.hash.as_bytes(), sig)
}

fn check_sender_index(
    env: &LmdbEnvironment,
    rtxn: &RoTxn,
    report: &mut IntegrityReport,
) -> Result<(), LmdbError> {
    let mut current: Option<(Address, u64)> = None;
    for result in env.by_sender_db.iter(rtxn)? {
        let (key, val) = result?;
        report.index_entries_checked += 1;
        let sender = Address::from_slice(key.get(..20).unwrap_or_default())
            .map_err(|e| LmdbError::Serialization(e.to_string()))?;
        let nonce = nonce_from_sender_key(key)?;
        let hash = hash_from(val)?;

        let expected = match current {
            Some((prev, last)) if prev == sender => last + 1,
            _ => 0,
        };
        if nonce != expected {
            report
                .errors
                .push(format!("sender {sender}: nonce {nonce} where {expected} expected"));
        }
        current = Some((sender, nonce));

        match load(env, rtxn, &hash)? {
            Some(tx) if tx.sender == sender && tx.nonce == nonce && !tx.is_genesis() => {}
            Some(_) => report
                .errors
                .push(format!("sender index entry {sender}/{nonce} points at mismatched {hash}")),
            None => report
                .errors
                .push(format!("sender index entry {sender}/{nonce} points at missing {hash}")),
        }
    }
    Ok(())
}

fn check_recipient_index(
    env: &LmdbEnvironment,
    rtxn: &RoTxn,
    report: &mut IntegrityReport,
) -> Result<(), LmdbError> {
    let entries = env.by_recipient_db.len(rtxn)?;
    let txs = env.txs_db.len(rtxn)?;
    report.index_entries_checked += entries;
    if entries != txs {
        report.errors.push(format!(
            "recipient index has {entries} entries for {txs} transactions"
        ));
    }
    for result in env.by_recipient_db.iter(rtxn)? {
        let (key, _) = result?;
        let recipient = Address::from_slice(key.get(..20).unwrap_or_default())
            .map_err(|e| LmdbError::Serialization(e.to_string()))?;
        let hash = hash_from(key.get(20..).unwrap_or_default())?;
        match load(env, rtxn, &hash)? {
            Some(tx) if tx.recipient == recipient => {}
            _ => report
                .errors
                .push(format!("recipient index entry {recipient}/{hash} is dangling")),
        }
    }
    Ok(())
}

fn check_children_index(
    env: &LmdbEnvironment,
    rtxn: &RoTxn,
    report: &mut IntegrityReport,
) -> Result<(), LmdbError> {
    for result in env.children_db.iter(rtxn)? {
        let (key, _) = result?;
        report.index_entries_checked += 1;
        let parent = hash_from(key.get(..32).unwrap_or_default())?;
        let child = hash_from(key.get(32..).unwrap_or_default())?;
        match load(env, rtxn, &child)? {
            Some(tx) if tx.parents.contains(&parent) => {}
            _ => report
                .errors
                .push(format!("children index edge {parent} -> {child} is dangling")),
        }
    }
    Ok(())
}
