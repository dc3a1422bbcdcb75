//! Reconnect supervision with exponential backoff.
//!
//! Policy: the delay before an attempt is `initial × 2^failures`, capped at
//! `max`, where `failures` counts consecutive failed attempts in the current
//! failure sequence. A successful connection ends the sequence, so the next
//! disconnect starts again from `initial`. Attempts never stop on their own.

use std::time::Duration;

use tracing::{info, warn};

use crate::transport::{Connector, Transport};

/// Delay before the first reconnect attempt.
pub const INITIAL_DELAY: Duration = Duration::from_millis(250);

/// Upper bound on the delay between attempts.
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Exponential backoff over one failure sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    /// Create a backoff starting at `initial` and capped at `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            failures: 0,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures);
        self.initial
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Consecutive failures in the current sequence.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt, doubling the next delay.
    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    /// End the failure sequence.
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_DELAY, MAX_DELAY)
    }
}

/// Re-establishes connections until one succeeds.
#[derive(Debug, Default)]
pub struct Supervisor {
    backoff: Backoff,
}

impl Supervisor {
    pub fn new(backoff: Backoff) -> Self {
        Self { backoff }
    }

    /// Open a connection through `connector`, retrying indefinitely.
    ///
    /// With `wait_first` the first attempt is delayed like a retry; this is
    /// how reconnects after a close start. The initial startup connect
    /// passes `false` and tries immediately.
    pub async fn establish<C: Connector>(
        &mut self,
        connector: &mut C,
        wait_first: bool,
    ) -> Transport {
        let mut wait = wait_first;
        loop {
            if wait {
                let delay = self.backoff.delay();
                info!(
                    delay_ms = delay.as_millis() as u64,
                    failures = self.backoff.failures(),
                    "reconnecting"
                );
                tokio::time::sleep(delay).await;
            }
            wait = true;

            match connector.connect().await {
                Ok(transport) => {
                    self.backoff.reset();
                    return transport;
                }
                Err(e) => {
                    self.backoff.record_failure();
                    warn!(
                        error = %e,
                        failures = self.backoff.failures(),
                        "connection attempt failed"
                    );
                }
            }
        }
    }
}
