//! Retry strategies for secret store requests.
//!
//! Only the store client retries. Dialing and authenticating against the
//! remote host is always a single attempt.

use std::time::Duration;

/// Retry strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// No retries.
    None,
    /// Fixed delay between retries.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
        /// Maximum attempts, including the first.
        max_attempts: u32,
    },
    /// Exponential backoff.
    Exponential {
        /// Initial delay.
        initial_delay: Duration,
        /// Maximum delay.
        max_delay: Duration,
        /// Multiplier for each attempt.
        multiplier: f64,
        /// Maximum attempts, including the first.
        max_attempts: u32,
    },
}

impl RetryStrategy {
    /// Create no retry strategy.
    #[must_use]
    pub const fn none() -> Self {
        Self::None
    }

    /// Create fixed delay strategy.
    #[must_use]
    pub const fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self::Fixed {
            delay,
            max_attempts,
        }
    }

    /// Create exponential backoff strategy doubling from `initial_delay` up to `max_delay`.
    #[must_use]
    pub const fn exponential(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self::Exponential {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            max_attempts,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (0-indexed),
    /// or `None` when no attempts remain.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                delay,
                max_attempts,
            } => (attempt + 1 < *max_attempts).then_some(*delay),
            Self::Exponential {
                initial_delay,
                max_delay,
                multiplier,
                max_attempts,
            } => (attempt + 1 < *max_attempts).then(|| {
                let delay = initial_delay.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(delay).min(*max_delay)
            }),
        }
    }

    /// Get max attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } | Self::Exponential { max_attempts, .. } => {
                *max_attempts
            }
        }
    }
}

/// Retry state tracker.
#[derive(Debug)]
pub struct RetryState {
    /// Current attempt (0-indexed).
    attempt: u32,
    /// Strategy in use.
    strategy: RetryStrategy,
}

impl RetryState {
    /// Create new state.
    #[must_use]
    pub const fn new(strategy: RetryStrategy) -> Self {
        Self {
            attempt: 0,
            strategy,
        }
    }

    /// Get current attempt.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt and return the delay before the next one,
    /// or `None` if the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.strategy.delay_after(self.attempt)?;
        self.attempt += 1;
        Some(delay)
    }
}
