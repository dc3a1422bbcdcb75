//! Per-user named timers.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use slirc_bot::{Context, Personality};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Timer {
    deadline: Instant,
    /// Where the timer was started; `None` for private messages.
    channel: Option<String>,
    announcement: String,
}

/// A timer that has run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired {
    pub user: String,
    pub channel: Option<String>,
    pub announcement: String,
}

/// Why a timer could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// The user already has a timer with this label.
    AlreadyRunning,
    /// The deadline is past what the clock can represent.
    OutOfRange,
}

#[derive(Debug, Default)]
pub struct Timers {
    by_user: HashMap<String, BTreeMap<String, Timer>>,
}

impl Timers {
    /// Start a timer for `user` that announces itself after `duration`.
    pub fn start(
        &mut self,
        user: &str,
        label: &str,
        duration: Duration,
        channel: Option<&str>,
        announcement: String,
    ) -> Result<(), StartError> {
        let deadline = Instant::now()
            .checked_add(duration)
            .ok_or(StartError::OutOfRange)?;
        let timers = self.by_user.entry(user.to_string()).or_default();
        if timers.contains_key(label) {
            return Err(StartError::AlreadyRunning);
        }
        timers.insert(
            label.to_string(),
            Timer {
                deadline,
                channel: channel.map(str::to_string),
                announcement,
            },
        );
        Ok(())
    }

    /// Remove a timer. Returns whether it existed.
    pub fn cancel(&mut self, user: &str, label: &str) -> bool {
        let removed = self
            .by_user
            .get_mut(user)
            .and_then(|timers| timers.remove(label))
            .is_some();
        self.by_user.retain(|_, timers| !timers.is_empty());
        removed
    }

    /// Labels and time left for each of `user`'s timers, ordered by label.
    pub fn remaining(&self, user: &str, now: Instant) -> Vec<(&str, Duration)> {
        self.by_user
            .get(user)
            .map(|timers| {
                timers
                    .iter()
                    .map(|(label, timer)| {
                        (label.as_str(), timer.deadline.saturating_duration_since(now))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_user
            .values()
            .flat_map(BTreeMap::values)
            .map(|timer| timer.deadline)
            .min()
    }

    /// Remove and return every timer due at or before `now`.
    pub fn take_expired(&mut self, now: Instant) -> Vec<Expired> {
        let mut expired = Vec::new();
        for (user, timers) in &mut self.by_user {
            let due: Vec<String> = timers
                .iter()
                .filter(|(_, timer)| timer.deadline <= now)
                .map(|(label, _)| label.clone())
                .collect();
            for label in due {
                if let Some(timer) = timers.remove(&label) {
                    expired.push(Expired {
                        user: user.clone(),
                        channel: timer.channel,
                        announcement: timer.announcement,
                    });
                }
            }
        }
        self.by_user.retain(|_, timers| !timers.is_empty());
        expired
    }
}

impl Personality for Timers {
    fn next_wakeup(&self) -> Option<Instant> {
        self.next_deadline()
    }

    fn on_wakeup(&mut self, now: Instant, ctx: &mut Context<'_>) {
        for done in self.take_expired(now) {
            ctx.reply(done.channel.as_deref(), &done.user, &done.announcement);
        }
    }
}
