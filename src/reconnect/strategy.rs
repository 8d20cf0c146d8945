//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Reconnection pacing strategies.
//!
//! A [`ReconnectionStrategy`] decides whether another connection attempt is
//! worth making and how long to wait before it. The provider consults the
//! strategy between failed attempts; a successful connection resets the
//! attempt counter.

use crate::error::RpcError;
use std::time::Duration;

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Decides the pacing of reconnection attempts.
pub trait ReconnectionStrategy: Send + Sync {
    /// Returns `true` if attempt number `attempt` (zero-based) should be
    /// made after `last_error`.
    fn should_reconnect(&self, attempt: u32, last_error: &RpcError) -> bool;

    /// Returns the delay before attempt number `attempt`.
    fn next_delay(&self, attempt: u32) -> Duration;

    /// Returns the strategy's name, for logging.
    fn name(&self) -> &str;
}

/// Constant delay between attempts, retrying forever.
///
/// # Examples
///
/// ```rust
/// use duplexrpc::reconnect::{FixedDelay, ReconnectionStrategy};
/// use std::time::Duration;
///
/// let strategy = FixedDelay::new(Duration::from_secs(5));
/// assert_eq!(strategy.next_delay(0), Duration::from_secs(5));
/// assert_eq!(strategy.next_delay(100), Duration::from_secs(5));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    /// Creates a strategy with a constant delay.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn should_reconnect(&self, _attempt: u32, _last_error: &RpcError) -> bool {
        true
    }

    fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn name(&self) -> &str {
        "FixedDelay"
    }
}

/// Exponentially growing delay with optional jitter and an attempt cap.
///
/// # Examples
///
/// ```rust
/// use duplexrpc::reconnect::ExponentialBackoff;
/// use std::time::Duration;
///
/// let strategy = ExponentialBackoff::builder()
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(30))
///     .multiplier(2.0)
///     .jitter(false)
///     .max_attempts(Some(10))
///     .build();
/// ```
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    max_attempts: Option<u32>,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
            max_attempts: None,
        }
    }
}

impl ExponentialBackoff {
    /// Creates a builder for configuring the backoff.
    #[must_use]
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = Duration::from_millis(base_ms as u64).min(self.max_delay);

        if self.jitter {
            // Jitter spreads attempts over the upper half of the nominal
            // delay; the lower half stays as a floor so retries never fire
            // tighter than half the configured back-off.
            let half = capped / 2;
            let jitter_ms = (rand::random::<f64>() * half.as_millis() as f64) as u64;
            half + Duration::from_millis(jitter_ms)
        } else {
            capped
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn should_reconnect(&self, attempt: u32, _last_error: &RpcError) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        self.calculate_delay(attempt)
    }

    fn name(&self) -> &str {
        "ExponentialBackoff"
    }
}

/// Builder for [`ExponentialBackoff`].
#[derive(Debug, Default)]
pub struct ExponentialBackoffBuilder {
    backoff: ExponentialBackoff,
}

impl ExponentialBackoffBuilder {
    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.backoff.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.backoff.max_delay = delay;
        self
    }

    /// Sets the exponential growth factor.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.backoff.multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    ///
    /// Jittered delays land in `[delay / 2, delay]` so staggering never
    /// undercuts half the nominal back-off.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.backoff.jitter = jitter;
        self
    }

    /// Caps the number of attempts; `None` retries forever.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.backoff.max_attempts = max_attempts;
        self
    }

    /// Builds the strategy.
    #[must_use]
    pub fn build(self) -> ExponentialBackoff {
        self.backoff
    }
}
