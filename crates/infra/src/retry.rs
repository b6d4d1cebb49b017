//! Bounded retry of optimistic read-plan-commit cycles.

use tracing::warn;

use stockflow_core::DomainResult;

/// How many times a service re-runs a unit of work that lost a version race.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConflictRetry {
    /// Extra attempts after the first (0 = no retries).
    pub max_retries: u32,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

impl ConflictRetry {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Check if more retries are allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Run `cycle` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. `cycle` receives the 0-based attempt number and must
    /// re-read everything it plans against.
    pub fn run<T>(
        &self,
        operation: &'static str,
        mut cycle: impl FnMut(u32) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let mut attempt = 0;
        loop {
            match cycle(attempt) {
                Err(err) if err.is_retryable() && self.should_retry(attempt) => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "conflict, retrying");
                    std::thread::yield_now();
                }
                other => return other,
            }
        }
    }
}
