//! Traffic-driven keepalive monitor.
//!
//! Every line in either direction rearms a single timer to fire one window
//! after that traffic. Rearming moves the existing deadline, so a stale
//! firing can never be observed after a reset. An optional coarse poll
//! compares idle time against the window on a fixed interval as a second
//! line of detection.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

/// Default keepalive window.
pub const PING_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Default interval of the idle poll.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Keepalive state for one connection.
#[derive(Debug)]
pub struct KeepAlive {
    window: Duration,
    last_activity: Instant,
    timer: Pin<Box<Sleep>>,
    poll: Option<Interval>,
}

impl KeepAlive {
    /// Arm a monitor whose window starts now.
    ///
    /// `poll` enables the redundant idle check at the given interval.
    pub fn new(window: Duration, poll: Option<Duration>) -> Self {
        let now = Instant::now();
        let poll = poll.filter(|p| !p.is_zero()).map(|period| {
            let mut interval = time::interval_at(now + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        Self {
            window,
            last_activity: now,
            timer: Box::pin(time::sleep_until(now + window)),
            poll,
        }
    }

    /// Record traffic and push the deadline out by one window.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        let deadline = self.last_activity + self.window;
        self.timer.as_mut().reset(deadline);
    }

    /// Instant of the most recent traffic.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// When the timer will fire unless traffic occurs first.
    pub fn deadline(&self) -> Instant {
        self.timer.deadline()
    }

    /// Time since the most recent traffic.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity)
    }

    /// Completes once the window has passed with no traffic.
    ///
    /// Cancel-safe: dropping the future leaves the deadline untouched.
    /// Returns how long the connection had been idle.
    pub async fn expired(&mut self) -> Duration {
        loop {
            match self.poll.as_mut() {
                Some(poll) => {
                    tokio::select! {
                        _ = self.timer.as_mut() => return self.idle_for(),
                        _ = poll.tick() => {
                            let idle = self.idle_for();
                            if idle > self.window {
                                return idle;
                            }
                        }
                    }
                }
                None => {
                    self.timer.as_mut().await;
                    return self.idle_for();
                }
            }
        }
    }
}
