//! The bot facade: channels, commands and error reporting on top of the
//! connection engine.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::client::{CloseReason, Events, Outbox};
use crate::command::{CommandSet, Request};
use crate::failures::FailureCache;
use crate::outbound::{canonical_channel, Outbound};

/// Default owner named in error replies.
pub const DEFAULT_OWNER: &str = "someone";

/// Handle given to handlers for acting on the connection.
pub struct Context<'a> {
    nickname: &'a str,
    channels: &'a mut BTreeSet<String>,
    out: &'a mut Outbox,
}

impl<'a> Context<'a> {
    pub fn new(nickname: &'a str, channels: &'a mut BTreeSet<String>, out: &'a mut Outbox) -> Self {
        Self {
            nickname,
            channels,
            out,
        }
    }

    /// The bot's own nickname.
    pub fn nickname(&self) -> &str {
        self.nickname
    }

    /// Channels joined so far, in canonical `#name` form.
    pub fn channels(&self) -> &BTreeSet<String> {
        self.channels
    }

    /// Join a channel and remember it for rejoining after reconnects.
    pub fn join(&mut self, channel: &str) {
        let channel = canonical_channel(channel);
        self.out.send(Outbound::Join(channel.clone()));
        self.channels.insert(channel);
    }

    /// Send `text` to a channel or user, one message per line.
    pub fn privmsg(&mut self, target: &str, text: &str) {
        self.out.privmsg(target, text);
    }

    /// Reply to `user`: in `channel` prefixed with their nick, or privately
    /// when there is no channel.
    pub fn reply(&mut self, channel: Option<&str>, user: &str, text: &str) {
        match channel {
            Some(channel) => self.privmsg(channel, &format!("{}: {}", user, text)),
            None => self.privmsg(user, text),
        }
    }

    /// Send `QUIT` and stop the engine without reconnecting.
    pub fn quit(&mut self, message: impl Into<String>) {
        self.out.quit(message);
    }
}

/// Timed behavior of a bot's state.
///
/// The engine asks for [`Personality::next_wakeup`] before every wait and
/// calls [`Personality::on_wakeup`] once that instant is reached.
pub trait Personality {
    fn next_wakeup(&self) -> Option<Instant> {
        None
    }

    fn on_wakeup(&mut self, _now: Instant, _ctx: &mut Context<'_>) {}
}

impl Personality for () {}

/// A bot with state `S`.
pub struct Bot<S> {
    nickname: String,
    owner: String,
    channels: BTreeSet<String>,
    commands: CommandSet<S>,
    failures: FailureCache,
    state: S,
}

impl<S> Bot<S> {
    pub fn new(nickname: impl Into<String>, commands: CommandSet<S>, state: S) -> Self {
        Self {
            nickname: nickname.into(),
            owner: DEFAULT_OWNER.to_string(),
            channels: BTreeSet::new(),
            commands,
            failures: FailureCache::default(),
            state,
        }
    }

    /// Person to ping when a command fails.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Channels joined on every connect.
    pub fn with_channels<I, T>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.channels
            .extend(channels.into_iter().map(|c| canonical_channel(c.as_ref())));
        self
    }

    pub fn with_failure_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.failures = FailureCache::new(capacity);
        self
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn channels(&self) -> &BTreeSet<String> {
        &self.channels
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    fn handle(&mut self, out: &mut Outbox, channel: Option<&str>, user: &str, text: &str) {
        let request = Request {
            channel,
            user,
            text,
        };
        let mut ctx = Context::new(&self.nickname, &mut self.channels, out);

        let failure = match self.commands.dispatch(&mut self.state, &mut ctx, &request) {
            Ok(_) => return,
            Err(failure) => failure,
        };

        error!(
            command = %failure.command,
            error = %failure.error,
            channel = channel.unwrap_or("(private)"),
            user,
            "command failed"
        );
        if self.failures.first_sighting(failure.signature()) {
            let apology = format!("an error occurred. Ping {} about it.", self.owner);
            ctx.reply(channel, user, &apology);
        } else {
            debug!(command = %failure.command, "repeat failure, not reporting");
        }
    }
}

impl<S: Personality> Events for Bot<S> {
    fn on_connect(&mut self, out: &mut Outbox) {
        for channel in &self.channels {
            info!(%channel, "joining");
            out.send(Outbound::Join(channel.clone()));
        }
    }

    fn on_channel_message(&mut self, out: &mut Outbox, channel: &str, user: &str, text: &str) {
        self.handle(out, Some(channel), user, text);
    }

    fn on_private_message(&mut self, out: &mut Outbox, user: &str, text: &str) {
        self.handle(out, None, user, text);
    }

    fn on_close(&mut self, reason: &CloseReason) {
        debug!(%reason, "bot notified of close");
    }

    fn on_timeout(&mut self) {
        info!("keepalive expired, dropping connection");
    }

    fn next_wakeup(&self) -> Option<Instant> {
        self.state.next_wakeup()
    }

    fn on_wakeup(&mut self, out: &mut Outbox) {
        let mut ctx = Context::new(&self.nickname, &mut self.channels, out);
        self.state.on_wakeup(Instant::now(), &mut ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;

    fn sent(out: &Outbox) -> Vec<String> {
        out.lines().iter().map(ToString::to_string).collect()
    }

    fn failing_bot() -> Bot<()> {
        let commands = CommandSet::builder()
            .command("boom", None, |_: &mut (), _, _| Err(HandlerError::failed("no")))
            .command("join", None, |_: &mut (), ctx, req| {
                ctx.join(req.text);
                Ok(None)
            })
            .build();
        Bot::new("bot", commands, ()).with_owner("carol")
    }

    #[test]
    fn test_connect_joins_recorded_channels() {
        let mut bot = Bot::new("bot", CommandSet::builder().build(), ())
            .with_channels(["lunch", "#dinner"]);
        let mut out = Outbox::new();
        bot.on_connect(&mut out);
        assert_eq!(sent(&out), vec!["JOIN #dinner", "JOIN #lunch"]);
    }

    #[test]
    fn test_join_is_remembered() {
        let mut bot = failing_bot();
        let mut out = Outbox::new();
        bot.on_private_message(&mut out, "alice", "%join snacks");
        assert_eq!(sent(&out), vec!["JOIN #snacks"]);
        assert!(bot.channels().contains("#snacks"));

        let mut out = Outbox::new();
        bot.on_connect(&mut out);
        assert_eq!(sent(&out), vec!["JOIN #snacks"]);
    }

    #[test]
    fn test_failure_reported_once() {
        let mut bot = failing_bot();

        let mut out = Outbox::new();
        bot.on_channel_message(&mut out, "#lunch", "alice", "%boom");
        assert_eq!(
            sent(&out),
            vec!["PRIVMSG #lunch :alice: an error occurred. Ping carol about it."]
        );

        let mut out = Outbox::new();
        bot.on_channel_message(&mut out, "#lunch", "bob", "%boom");
        assert!(out.is_empty());
    }

    #[test]
    fn test_private_failure_reply_is_unprefixed() {
        let mut bot = failing_bot();
        let mut out = Outbox::new();
        bot.on_private_message(&mut out, "alice", "%boom");
        assert_eq!(
            sent(&out),
            vec!["PRIVMSG alice :an error occurred. Ping carol about it."]
        );
    }

    #[test]
    fn test_context_quit() {
        let mut channels = BTreeSet::new();
        let mut out = Outbox::new();
        let mut ctx = Context::new("bot", &mut channels, &mut out);
        ctx.reply(Some("#lunch"), "alice", "done");
        ctx.quit("later");
        assert_eq!(sent(&out), vec!["PRIVMSG #lunch :alice: done"]);
        assert_eq!(out.quit_message(), Some("later"));
    }
}
