//! Review and execution policy for batch runs.

use std::time::Duration;

use hackverse_config::ReviewSettings;
pub use hackverse_config::defaults::DEFAULT_FLAG_THRESHOLD;

/// Decides which pairs a judge should look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlagPolicy {
    /// Inclusive lower bound for flagging.
    pub threshold: f64,
}

impl Default for FlagPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_FLAG_THRESHOLD,
        }
    }
}

impl From<ReviewSettings> for FlagPolicy {
    fn from(settings: ReviewSettings) -> Self {
        Self::new(settings.flag_threshold)
    }
}

impl FlagPolicy {
    /// Policy with a custom threshold.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether `similarity` warrants review.
    #[must_use]
    pub fn is_flagged(&self, similarity: f64) -> bool {
        similarity >= self.threshold
    }
}

/// Concurrency and retry behaviour of a batch run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPolicy {
    /// Maximum comparisons in flight.
    pub max_concurrency: usize,
    /// Extra attempts for retryable failures.
    pub retries: u32,
    /// Delay before the first retry; doubles for each further attempt.
    pub retry_backoff: Duration,
    /// Flagging rule applied to every score.
    pub flag: FlagPolicy,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            retries: 2,
            retry_backoff: Duration::from_millis(500),
            flag: FlagPolicy::default(),
        }
    }
}

impl BatchPolicy {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_backoff.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_threshold_is_inclusive() {
        let policy = FlagPolicy::default();
        assert!(policy.is_flagged(0.85));
        assert!(policy.is_flagged(1.0));
        assert!(!policy.is_flagged(0.849));
    }

    #[test]
    fn backoff_doubles() {
        let policy = BatchPolicy {
            retry_backoff: Duration::from_millis(100),
            ..BatchPolicy::default()
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
    }
}
