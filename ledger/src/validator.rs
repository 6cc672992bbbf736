//! Admission checks for candidate transactions.
//!
//! [`Validator`] runs eight checks in a fixed order against one snapshot and
//! reports the first failure. It holds no state beyond the network's
//! hash/curve selection and limits.

use std::time::Duration;

use dagnet_store::DagSnapshot;
use dagnet_transactions::{check_well_formed, Transaction};
use dagnet_types::{CurveId, HashId, NetworkConfig, PublicKey, Timestamp};

use crate::balance;
use crate::deadline::Deadline;
use crate::error::LedgerError;
use crate::query::descendant_count;

/// Clock drift tolerated on a transaction's timestamp.
pub const DEFAULT_MAX_FUTURE_DRIFT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub hash_id: HashId,
    pub curve_id: CurveId,
    pub max_future_drift: Duration,
    /// K: descendants a non-tip parent needs to be referenced.
    pub confirmation_depth: u32,
}

impl ValidatorConfig {
    pub fn for_network(config: &NetworkConfig) -> Self {
        Self {
            hash_id: config.hash_id,
            curve_id: config.curve_id,
            max_future_drift: DEFAULT_MAX_FUTURE_DRIFT,
            confirmation_depth: config.confirmation_depth,
        }
    }

    pub fn with_max_future_drift(mut self, drift: Duration) -> Self {
        self.max_future_drift = drift;
        self
    }
}

/// Per-call inputs that do not come from the snapshot.
#[derive(Clone, Debug, Default)]
pub struct ValidationContext {
    pub now: Timestamp,
    /// Used when the transaction carries no `sender_public_key`.
    pub public_key: Option<PublicKey>,
    pub deadline: Deadline,
}

impl ValidationContext {
    pub fn at(now: Timestamp) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn with_public_key(mut self, key: PublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }
}

/// A set of admission checks. Alternative rule sets plug in here.
pub trait AdmissionCheck: Send + Sync {
    fn validate<S: DagSnapshot>(
        &self,
        snapshot: &S,
        tx: &Transaction,
        ctx: &ValidationContext,
    ) -> Result<(), LedgerError>;
}

#[derive(Clone, Debug)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    fn check_encoding(&self, tx: &Transaction) -> Result<(), LedgerError> {
        check_well_formed(tx, self.config.hash_id)
            .map_err(|e| LedgerError::InvalidEncoding(e.to_string()))
    }

    fn check_not_duplicate<S: DagSnapshot>(&self, snap: &S, tx: &Transaction) -> Result<(), LedgerError> {
        if snap.contains(&tx.hash)? {
            return Err(LedgerError::DuplicateTransaction(tx.hash));
        }
        Ok(())
    }

    fn check_parents_known<S: DagSnapshot>(&self, snap: &S, tx: &Transaction) -> Result<(), LedgerError> {
        let mut missing = Vec::new();
        for p in &tx.parents {
            if !snap.contains(p)? {
                missing.push(*p);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::MissingParents { hashes: missing })
        }
    }

    fn check_timestamp<S: DagSnapshot>(
        &self,
        snap: &S,
        tx: &Transaction,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        for p in &tx.parents {
            let parent = snap.get_transaction(p)?.ok_or(LedgerError::MissingParents {
                hashes: vec![*p],
            })?;
            if parent.timestamp > tx.timestamp {
                return Err(LedgerError::InvalidTimestamp(format!(
                    "parent {p} at {} is after {}",
                    parent.timestamp, tx.timestamp
                )));
            }
        }
        let horizon = now.saturating_add(self.config.max_future_drift);
        if tx.timestamp > horizon {
            return Err(LedgerError::InvalidTimestamp(format!(
                "{} is beyond {horizon}",
                tx.timestamp
            )));
        }
        Ok(())
    }

    fn check_signature(&self, tx: &Transaction, ctx: &ValidationContext) -> Result<(), LedgerError> {
        let Some(signature) = tx.signature.as_ref() else {
            return Err(LedgerError::InvalidSignature("missing signature".into()));
        };
        let Some(key) = tx.sender_public_key.as_ref().or(ctx.public_key.as_ref()) else {
            return Err(LedgerError::InvalidSignature("no public key for sender".into()));
        };
        if signature.curve != self.config.curve_id {
            return Err(LedgerError::InvalidSignature(format!(
                "signed with {} on a {} network",
                signature.curve, self.config.curve_id
            )));
        }
        if dagnet_crypto::address_of(self.config.hash_id, key) != tx.sender {
            return Err(LedgerError::InvalidSignature(
                "public key does not hash to sender".into(),
            ));
        }
        if !dagnet_crypto::verify_digest(self.config.curve_id, key, tx.hash.as_bytes(), signature) {
            return Err(LedgerError::InvalidSignature("verification failed".into()));
        }
        Ok(())
    }

    fn check_nonce<S: DagSnapshot>(&self, snap: &S, tx: &Transaction) -> Result<(), LedgerError> {
        let expected = match snap.last_nonce(&tx.sender)? {
            None => Some(0),
            Some(n) => n.checked_add(1),
        };
        match expected {
            Some(e) if e == tx.nonce => Ok(()),
            e => Err(LedgerError::InvalidNonce {
                expected: e.unwrap_or(u64::MAX),
                got: tx.nonce,
            }),
        }
    }

    fn check_balance<S: DagSnapshot>(
        &self,
        snap: &S,
        tx: &Transaction,
        deadline: &Deadline,
    ) -> Result<(), LedgerError> {
        let have = balance::balance_of(snap, &tx.sender, deadline)?;
        let need = tx.cost();
        if have < need {
            return Err(LedgerError::InsufficientBalance { have, need });
        }
        Ok(())
    }

    /// At least one parent must be a tip, or every parent must already have
    /// K descendants.
    fn check_depth<S: DagSnapshot>(
        &self,
        snap: &S,
        tx: &Transaction,
        deadline: &Deadline,
    ) -> Result<(), LedgerError> {
        for p in &tx.parents {
            if snap.is_tip(p)? {
                return Ok(());
            }
        }
        let k = u64::from(self.config.confirmation_depth);
        for p in &tx.parents {
            if descendant_count(snap, p, k, deadline)? < k {
                return Err(LedgerError::InvalidDepth);
            }
        }
        Ok(())
    }
}

impl AdmissionCheck for Validator {
    fn validate<S: DagSnapshot>(
        &self,
        snapshot: &S,
        tx: &Transaction,
        ctx: &ValidationContext,
    ) -> Result<(), LedgerError> {
        ctx.deadline.check()?;
        self.check_encoding(tx)?;
        self.check_not_duplicate(snapshot, tx)?;
        self.check_parents_known(snapshot, tx)?;
        self.check_timestamp(snapshot, tx, ctx.now)?;
        // Genesis transactions are only ever written by genesis itself and
        // carry no signature, so one arriving here fails this check.
        self.check_signature(tx, ctx)?;
        self.check_nonce(snapshot, tx)?;
        self.check_balance(snapshot, tx, &ctx.deadline)?;
        self.check_depth(snapshot, tx, &ctx.deadline)
    }
}
