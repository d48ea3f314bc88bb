//! Per-track play failure ledger

use halfbeat_core::TrackId;
use std::collections::HashMap;

/// Consecutive transport failures per track
///
/// A track is retried while its count is below `max_attempts`; reaching it
/// stops automatic retries until the entry is cleared by a deliberate
/// replay or a successful start.
#[derive(Debug, Clone)]
pub struct RetryLedger {
    failures: HashMap<TrackId, u32>,
    max_attempts: u32,
}

/// Decision after recording a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry on the next ready signal
    Retry { attempts: u32 },

    /// Out of attempts
    GiveUp { attempts: u32 },
}

impl RetryLedger {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            failures: HashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Record one failure for `id`
    pub fn record_failure(&mut self, id: &TrackId) -> RetryDecision {
        let attempts = self.failures.entry(id.clone()).or_insert(0);
        *attempts += 1;

        if *attempts >= self.max_attempts {
            RetryDecision::GiveUp {
                attempts: *attempts,
            }
        } else {
            RetryDecision::Retry {
                attempts: *attempts,
            }
        }
    }

    /// Whether `id` may still be retried automatically
    pub fn can_retry(&self, id: &TrackId) -> bool {
        self.attempts(id) < self.max_attempts
    }

    pub fn attempts(&self, id: &TrackId) -> u32 {
        self.failures.get(id).copied().unwrap_or(0)
    }

    pub fn clear(&mut self, id: &TrackId) {
        self.failures.remove(id);
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryLedger {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gives_up_on_third_failure() {
        let mut ledger = RetryLedger::default();
        let id = TrackId::from("a");

        assert_eq!(ledger.record_failure(&id), RetryDecision::Retry { attempts: 1 });
        assert_eq!(ledger.record_failure(&id), RetryDecision::Retry { attempts: 2 });
        assert!(ledger.can_retry(&id));
        assert_eq!(ledger.record_failure(&id), RetryDecision::GiveUp { attempts: 3 });
        assert!(!ledger.can_retry(&id));
    }

    #[test]
    fn success_resets_count() {
        let mut ledger = RetryLedger::default();
        let id = TrackId::from("a");

        ledger.record_failure(&id);
        ledger.record_failure(&id);
        ledger.clear(&id);
        assert_eq!(ledger.attempts(&id), 0);

        assert_eq!(ledger.record_failure(&id), RetryDecision::Retry { attempts: 1 });
    }

    #[test]
    fn tracks_are_independent() {
        let mut ledger = RetryLedger::new(2);
        let a = TrackId::from("a");
        let b = TrackId::from("b");

        ledger.record_failure(&a);
        assert_eq!(ledger.attempts(&b), 0);
        assert_eq!(ledger.record_failure(&a), RetryDecision::GiveUp { attempts: 2 });
    }
}
