//! The connection engine.
//!
//! [`Client`] drives one server connection at a time on a single task. Each
//! session waits on four sources at once: inbound lines, the keepalive
//! timer, the next wakeup requested by the event handler, and external
//! shutdown. Whatever fires is handled to completion before the next wait,
//! so event handlers never run concurrently.
//!
//! Event handlers never write to the socket directly. They queue lines in
//! an [`Outbox`], which the engine flushes as soon as the handler returns.

use std::fmt;
use std::future;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProtocolError;
use crate::keepalive::{KeepAlive, IDLE_POLL_INTERVAL, PING_TIMEOUT};
use crate::outbound::Outbound;
use crate::reconnect::{Backoff, Supervisor};
use crate::state::{Action, HandshakeConfig, HandshakeState, ProtocolMachine};
use crate::transport::{Connector, Transport};

/// Lines queued by an event handler.
#[derive(Debug, Default)]
pub struct Outbox {
    lines: Vec<Outbound>,
    quit: Option<String>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary command.
    pub fn send(&mut self, out: Outbound) {
        self.lines.push(out);
    }

    /// Queue a `JOIN`, adding `#` if it is missing.
    pub fn join(&mut self, channel: &str) {
        self.send(Outbound::join(channel));
    }

    /// Queue one `PRIVMSG` per line of `text`.
    pub fn privmsg(&mut self, target: &str, text: &str) {
        self.lines.extend(Outbound::privmsg(target, text));
    }

    /// Ask the engine to send `QUIT` and stop for good once the queued
    /// lines are out.
    pub fn quit(&mut self, message: impl Into<String>) {
        self.quit = Some(message.into());
    }

    pub fn lines(&self) -> &[Outbound] {
        &self.lines
    }

    pub fn quit_message(&self) -> Option<&str> {
        self.quit.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.quit.is_none()
    }
}

/// Callbacks invoked by the engine.
///
/// Every method has a no-op default.
pub trait Events {
    /// Registration with the server completed.
    fn on_connect(&mut self, _out: &mut Outbox) {}

    fn on_channel_message(&mut self, _out: &mut Outbox, _channel: &str, _user: &str, _text: &str) {
    }

    fn on_private_message(&mut self, _out: &mut Outbox, _user: &str, _text: &str) {}

    /// The connection closed. Called exactly once per connection, whatever
    /// the cause.
    fn on_close(&mut self, _reason: &CloseReason) {}

    /// The keepalive window passed with no traffic. The connection is
    /// closed right after this returns.
    fn on_timeout(&mut self) {}

    /// Earliest instant at which [`Events::on_wakeup`] should run. Only
    /// consulted while the connection is registered.
    fn next_wakeup(&self) -> Option<Instant> {
        None
    }

    /// The instant returned by [`Events::next_wakeup`] has been reached.
    fn on_wakeup(&mut self, _out: &mut Outbox) {}
}

/// Why a connection ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// An event handler asked to quit.
    Quit,
    /// The process is shutting down.
    Shutdown,
    /// No traffic within the keepalive window.
    Timeout,
    /// The server sent `ERROR :Closing Link ...`.
    ClosingLink(String),
    /// The peer closed the stream.
    Eof,
    /// Reading or writing failed.
    Io(String),
}

impl CloseReason {
    /// Whether the engine reconnects after a close for this reason.
    pub fn reconnects(&self) -> bool {
        !matches!(self, Self::Quit | Self::Shutdown)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => f.write_str("quit"),
            Self::Shutdown => f.write_str("shutdown"),
            Self::Timeout => f.write_str("keepalive timeout"),
            Self::ClosingLink(text) => write!(f, "server closed link: {}", text),
            Self::Eof => f.write_str("connection closed by peer"),
            Self::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl From<ProtocolError> for CloseReason {
    fn from(e: ProtocolError) -> Self {
        Self::Io(e.to_string())
    }
}

/// Engine settings.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub handshake: HandshakeConfig,
    /// Keepalive window.
    pub ping_timeout: Duration,
    /// Interval of the redundant idle check; `None` disables it.
    pub idle_poll: Option<Duration>,
    pub backoff: Backoff,
    /// Text of the `QUIT` sent on shutdown.
    pub quit_message: String,
}

impl ClientConfig {
    pub fn new(handshake: HandshakeConfig) -> Self {
        Self {
            handshake,
            ping_timeout: PING_TIMEOUT,
            idle_poll: Some(IDLE_POLL_INTERVAL),
            backoff: Backoff::default(),
            quit_message: "bye".to_string(),
        }
    }
}

/// One live connection: transport, handshake progress and keepalive.
struct Connection {
    transport: Transport,
    machine: ProtocolMachine,
    keepalive: KeepAlive,
}

impl Connection {
    fn new(transport: Transport, config: &ClientConfig) -> Self {
        Self {
            transport,
            machine: ProtocolMachine::new(config.handshake.clone()),
            keepalive: KeepAlive::new(config.ping_timeout, config.idle_poll),
        }
    }

    /// Write one line. A line too long for the codec is logged and skipped;
    /// nothing reaches the socket, so the session carries on.
    async fn send(&mut self, out: Outbound) -> Result<(), ProtocolError> {
        match &out {
            Outbound::Pass(_) => debug!("<<< PASS ****"),
            other => debug!("<<< {}", other),
        }
        self.keepalive.touch();
        match self.transport.send_line(out.into()).await {
            Err(ProtocolError::LineTooLong { actual, limit }) => {
                warn!(actual, limit, "dropping oversize outbound line");
                Ok(())
            }
            result => result,
        }
    }

    /// Send everything a handler queued. Returns the reason to end the
    /// session, if any.
    async fn flush(&mut self, outbox: Outbox) -> Option<CloseReason> {
        for out in outbox.lines {
            if let Err(e) = self.send(out).await {
                return Some(e.into());
            }
        }
        let message = outbox.quit?;
        info!(%message, "quitting");
        if let Err(e) = self.send(Outbound::Quit(message)).await {
            debug!(error = %e, "failed to send QUIT");
        }
        Some(CloseReason::Quit)
    }

    /// Apply the actions produced for one inbound line.
    async fn apply<E: Events>(&mut self, actions: Vec<Action>, events: &mut E) -> Option<CloseReason> {
        for action in actions {
            let mut out = Outbox::new();
            match action {
                Action::Send(line) => {
                    if let Err(e) = self.send(line).await {
                        return Some(e.into());
                    }
                    continue;
                }
                Action::Connected => {
                    info!(nickname = self.machine.nickname(), "registered");
                    events.on_connect(&mut out);
                }
                Action::ChannelMessage {
                    channel,
                    user,
                    text,
                } => events.on_channel_message(&mut out, &channel, &user, &text),
                Action::PrivateMessage { user, text } => {
                    events.on_private_message(&mut out, &user, &text)
                }
                Action::Close(text) => return Some(CloseReason::ClosingLink(text)),
            }
            if let Some(reason) = self.flush(out).await {
                return Some(reason);
            }
        }
        None
    }
}

enum Step {
    Line(Option<Result<String, ProtocolError>>),
    Timeout(Duration),
    Wakeup,
    Shutdown,
}

/// Sleep until `deadline`, or forever if there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Reconnecting client.
pub struct Client<C> {
    connector: C,
    config: ClientConfig,
    supervisor: Supervisor,
}

impl<C: Connector> Client<C> {
    pub fn new(connector: C, config: ClientConfig) -> Self {
        let supervisor = Supervisor::new(config.backoff.clone());
        Self {
            connector,
            config,
            supervisor,
        }
    }

    /// Connect and process events until a handler quits or `shutdown` is
    /// cancelled. Every other close is followed by a reconnect.
    pub async fn run<E: Events>(&mut self, events: &mut E, shutdown: CancellationToken) {
        let mut wait_first = false;
        loop {
            let transport = tokio::select! {
                transport = self.supervisor.establish(&mut self.connector, wait_first) => transport,
                _ = shutdown.cancelled() => {
                    info!("shutdown requested while connecting");
                    return;
                }
            };
            wait_first = true;

            let reason = self.session(transport, events, &shutdown).await;
            match &reason {
                CloseReason::Quit | CloseReason::Shutdown => info!(%reason, "connection closed"),
                _ => warn!(%reason, "connection closed"),
            }
            events.on_close(&reason);

            if !reason.reconnects() {
                return;
            }
        }
    }

    async fn session<E: Events>(
        &mut self,
        transport: Transport,
        events: &mut E,
        shutdown: &CancellationToken,
    ) -> CloseReason {
        let mut conn = Connection::new(transport, &self.config);
        let reason = loop {
            // Handlers only talk to the server once registration is done.
            let wakeup = match conn.machine.state() {
                HandshakeState::Connected => events.next_wakeup(),
                _ => None,
            };
            let step = tokio::select! {
                line = conn.transport.next_line() => Step::Line(line),
                idle = conn.keepalive.expired() => Step::Timeout(idle),
                _ = sleep_until(wakeup) => Step::Wakeup,
                _ = shutdown.cancelled() => Step::Shutdown,
            };

            match step {
                Step::Line(None) => break CloseReason::Eof,
                Step::Line(Some(Err(e))) => break e.into(),
                Step::Line(Some(Ok(line))) => {
                    debug!(">>> {}", line.trim_end());
                    conn.keepalive.touch();
                    let actions = conn.machine.feed(&line);
                    if let Some(reason) = conn.apply(actions, events).await {
                        break reason;
                    }
                }
                Step::Timeout(idle) => {
                    warn!(idle_secs = idle.as_secs(), "no traffic within keepalive window");
                    events.on_timeout();
                    break CloseReason::Timeout;
                }
                Step::Wakeup => {
                    let mut out = Outbox::new();
                    events.on_wakeup(&mut out);
                    if let Some(reason) = conn.flush(out).await {
                        break reason;
                    }
                }
                Step::Shutdown => {
                    if conn.machine.state() == HandshakeState::Connected {
                        let quit = Outbound::Quit(self.config.quit_message.clone());
                        if let Err(e) = conn.send(quit).await {
                            debug!(error = %e, "failed to send QUIT");
                        }
                    }
                    break CloseReason::Shutdown;
                }
            }
        };

        conn.transport.close().await;
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_queues_in_order() {
        let mut out = Outbox::new();
        assert!(out.is_empty());
        out.join("lunch");
        out.privmsg("#lunch", "a\nb");
        out.quit("later");
        let lines: Vec<String> = out.lines().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec!["JOIN #lunch", "PRIVMSG #lunch :a", "PRIVMSG #lunch :b"]
        );
        assert_eq!(out.quit_message(), Some("later"));
        assert!(!out.is_empty());
    }

    #[test]
    fn test_close_reason_reconnects() {
        assert!(!CloseReason::Quit.reconnects());
        assert!(!CloseReason::Shutdown.reconnects());
        assert!(CloseReason::Timeout.reconnects());
        assert!(CloseReason::Eof.reconnects());
        assert!(CloseReason::ClosingLink("Closing Link: x".into()).reconnects());
        assert!(CloseReason::Io("broken pipe".into()).reconnects());
    }
}
