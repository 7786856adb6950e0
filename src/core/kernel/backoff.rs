use std::time::Duration;

/// Delay schedule between reconnection attempts.
///
/// There is no attempt limit: the schedule only bounds how fast a dead
/// endpoint is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap applied before jitter
    pub max_delay: Duration,
    /// Add a random 0-50% on top of each delay
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Retry immediately after cleanup, no delay at all
    pub const fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }
}

/// Exponential backoff state for one supervisor.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub const fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Consecutive failures since the last reset
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay to wait before the next attempt; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = calculate_backoff(
            self.config.initial_delay,
            self.config.max_delay,
            self.attempt,
        );
        self.attempt = self.attempt.saturating_add(1);

        if self.config.jitter && !base.is_zero() {
            let jitter_frac = rand::random::<f64>() * 0.5;
            base + Duration::from_secs_f64(base.as_secs_f64() * jitter_frac)
        } else {
            base
        }
    }

    /// Start over from the initial delay, after a session got healthy.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// `initial * 2^attempt`, capped at `max`.
pub(crate) fn calculate_backoff(initial: Duration, max: Duration, attempt: u32) -> Duration {
    initial
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(max)
}
