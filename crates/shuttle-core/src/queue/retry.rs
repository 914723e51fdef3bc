//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Backoff schedule for failed jobs.
///
/// A flat step table rather than exponential growth: the n-th failure waits
/// `steps[n - 1]`, and every failure past the end of the table waits the last
/// step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    steps: Vec<Duration>,
}

impl RetryPolicy {
    /// 10s, 60s, then 300s for every later failure.
    pub fn fixed_steps() -> Self {
        Self::from_steps(vec![
            Duration::from_secs(10),
            Duration::from_secs(60),
            Duration::from_secs(300),
        ])
    }

    /// Custom table. An empty table retries immediately.
    pub fn from_steps(steps: Vec<Duration>) -> Self {
        Self { steps }
    }

    /// Delay before the next run after `attempts` failures (1-indexed).
    ///
    /// `attempts = 0` is treated like the first failure.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let Some(last) = self.steps.last() else {
            return Duration::ZERO;
        };
        let index = attempts.saturating_sub(1) as usize;
        self.steps.get(index).copied().unwrap_or(*last)
    }

    /// Whether a failure at `attempts` exhausts the budget.
    pub fn is_terminal(attempts: u32, max_attempts: u32) -> bool {
        attempts >= max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed_steps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0, 10)]
    #[case::first(1, 10)]
    #[case::second(2, 60)]
    #[case::third(3, 300)]
    #[case::fourth(4, 300)]
    #[case::many(40, 300)]
    fn fixed_step_schedule(#[case] attempts: u32, #[case] secs: u64) {
        let policy = RetryPolicy::fixed_steps();
        assert_eq!(policy.backoff(attempts), Duration::from_secs(secs));
    }

    #[test]
    fn empty_table_retries_immediately() {
        let policy = RetryPolicy::from_steps(vec![]);
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }

    #[rstest]
    #[case(1, 5, false)]
    #[case(4, 5, false)]
    #[case(5, 5, true)]
    #[case(6, 5, true)]
    #[case(1, 1, true)]
    fn terminal_when_attempts_reach_max(
        #[case] attempts: u32,
        #[case] max: u32,
        #[case] terminal: bool,
    ) {
        assert_eq!(RetryPolicy::is_terminal(attempts, max), terminal);
    }
}
