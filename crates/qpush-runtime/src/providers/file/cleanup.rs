//! When a file queue sweeps expired messages.
//!
//! Every successful `delete` asks the queue's [`CleanupTrigger`] whether to
//! run a cleanup pass, amortizing garbage collection over normal traffic.

use crate::error::ValidationError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Policy deciding whether a delete triggers a cleanup pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Only explicit `cleanup` calls sweep
    Never,
    /// Sweep after every delete
    Always,
    /// Sweep with the given probability (0.0 - 1.0) after each delete
    Probability(f64),
    /// Sweep after every n-th delete
    EveryNth(u64),
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::Probability(0.1)
    }
}

impl CleanupPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::Probability(p) if !(0.0..=1.0).contains(&p) => Err(ValidationError::OutOfRange {
                field: "cleanup.probability".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            }),
            Self::EveryNth(0) => Err(ValidationError::OutOfRange {
                field: "cleanup.every_nth".to_string(),
                message: "must be at least 1".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Stateful evaluator of a [`CleanupPolicy`]
#[derive(Debug)]
pub struct CleanupTrigger {
    policy: CleanupPolicy,
    deletes: AtomicU64,
}

impl CleanupTrigger {
    pub fn new(policy: CleanupPolicy) -> Self {
        Self {
            policy,
            deletes: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Record a delete and decide whether to sweep now
    pub fn should_run(&self) -> bool {
        let count = self.deletes.fetch_add(1, Ordering::Relaxed) + 1;
        match self.policy {
            CleanupPolicy::Never => false,
            CleanupPolicy::Always => true,
            CleanupPolicy::Probability(p) => {
                p.is_finite() && rand::thread_rng().gen_bool(p.clamp(0.0, 1.0))
            }
            CleanupPolicy::EveryNth(n) => n > 0 && count % n == 0,
        }
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
