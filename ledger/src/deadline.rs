//! Deadlines and explicit cancellation for long-running reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::LedgerError;

/// A point in time after which work should stop, plus an optional flag
/// another task can raise to cancel early.
#[derive(Clone, Debug, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    budget: Option<Duration>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl Deadline {
    /// Never expires.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
            budget: Some(timeout),
            cancelled: None,
        }
    }

    /// The same budget counted again from now. The cancellation flag, if
    /// any, carries over.
    pub fn renewed(&self) -> Self {
        Self {
            expires_at: self.budget.and_then(|b| Instant::now().checked_add(b)),
            budget: self.budget,
            cancelled: self.cancelled.clone(),
        }
    }

    /// Attach a cancellation flag. Setting it to `true` cancels the work.
    pub fn with_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    pub fn is_expired(&self) -> bool {
        if let Some(flag) = &self.cancelled {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        matches!(self.expires_at, Some(at) if Instant::now() >= at)
    }

    /// `Err(Cancelled)` once the deadline has passed or the flag is raised.
    pub fn check(&self) -> Result<(), LedgerError> {
        if self.is_expired() {
            Err(LedgerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
