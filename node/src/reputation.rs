//! Peer scoring and banning.
//!
//! Scores start at 0 and are clamped to [`SCORE_MIN`]..=[`SCORE_MAX`]. A peer
//! whose score reaches [`BAN_THRESHOLD`] is banned for [`BAN_DURATION`] and
//! its publishes are ignored until the ban lapses.

use std::collections::HashMap;
use std::time::Duration;

use dagnet_types::{PeerId, Timestamp};

/// Score at or below which a peer is banned.
pub const BAN_THRESHOLD: i32 = -500;
pub const BAN_DURATION: Duration = Duration::from_secs(3600);
pub const SCORE_MIN: i32 = -1000;
pub const SCORE_MAX: i32 = 100;

/// Reasons a peer can be penalized. Each carries a fixed penalty value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PenaltyReason {
    /// A transaction it sent failed validation through its own fault.
    RejectedTransaction,
    /// An orphan it sent never had its parents resolved.
    ExpiredOrphan,
    /// A frame that does not decode.
    MalformedFrame,
    /// It answered `RequestConfig` with a different network.
    ConfigMismatch,
}

impl PenaltyReason {
    /// Penalty points deducted for this reason (always negative).
    pub fn penalty(self) -> i32 {
        match self {
            Self::RejectedTransaction => -50,
            Self::ExpiredOrphan => -10,
            Self::MalformedFrame => -100,
            Self::ConfigMismatch => SCORE_MIN,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RejectedTransaction => "rejected_transaction",
            Self::ExpiredOrphan => "expired_orphan",
            Self::MalformedFrame => "malformed_frame",
            Self::ConfigMismatch => "config_mismatch",
        }
    }
}

/// Points credited for an accepted transaction.
pub const ACCEPT_REWARD: i32 = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerScore {
    pub score: i32,
    pub banned_until: Option<Timestamp>,
}

#[derive(Debug, Default)]
pub struct Reputation {
    peers: HashMap<PeerId, PeerScore>,
}

impl Reputation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Penalize a peer for bad behaviour. Returns `true` if the peer was
    /// banned as a result.
    pub fn penalize(&mut self, peer: &PeerId, reason: PenaltyReason, now: Timestamp) -> bool {
        let entry = self.peers.entry(peer.clone()).or_default();
        entry.score = entry.score.saturating_add(reason.penalty()).max(SCORE_MIN);
        if entry.score <= BAN_THRESHOLD && entry.banned_until.is_none() {
            entry.banned_until = Some(now.saturating_add(BAN_DURATION));
            tracing::warn!(peer = %peer, reason = reason.as_str(), "peer banned");
            return true;
        }
        false
    }

    /// Reward a peer for good behaviour (e.g. delivering a valid transaction).
    pub fn reward(&mut self, peer: &PeerId, amount: i32) {
        let entry = self.peers.entry(peer.clone()).or_default();
        entry.score = entry.score.saturating_add(amount).min(SCORE_MAX);
    }

    /// Whether `peer` is banned at `now`. Expired bans are lifted and the
    /// score reset.
    pub fn is_banned(&mut self, peer: &PeerId, now: Timestamp) -> bool {
        let Some(entry) = self.peers.get_mut(peer) else {
            return false;
        };
        match entry.banned_until {
            Some(until) if now >= until => {
                entry.banned_until = None;
                entry.score = 0;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn score(&self, peer: &PeerId) -> i32 {
        self.peers.get(peer).map_or(0, |p| p.score)
    }
}
