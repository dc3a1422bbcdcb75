//! Sans-IO protocol state machine.
//!
//! [`ProtocolMachine`] consumes raw inbound lines and produces [`Action`]s:
//! lines to send and high-level events for the engine to deliver. It
//! performs no I/O and owns no timers, so every transition is unit-testable.
//!
//! # Handshake
//!
//! The handshake advances on receipt of *any* line while not yet
//! connected; it does not wait for specific numerics:
//!
//! | State        | On any line                      |
//! |--------------|----------------------------------|
//! | Disconnected | send `PASS` (if configured)      |
//! | AwaitingNick | send `NICK`, `USER`              |
//! | Registering  | report [`Action::Connected`]     |
//! | Connected    | classify and report the message  |
//!
//! A `PING` is answered with a `PONG` in every state, before the
//! handshake step for that line.
//!
//! A server that sends several lines before it is ready for `NICK`, or
//! that reorders its greeting, can push this machine out of step with the
//! real registration. The behavior is kept as-is; callers relying on it
//! against unusual servers should watch the handshake in the logs.
//!
//! # Example
//!
//! ```
//! use slirc_bot::state::{Action, HandshakeConfig, HandshakeState, ProtocolMachine};
//! use slirc_bot::Outbound;
//!
//! let mut machine = ProtocolMachine::new(HandshakeConfig {
//!     nickname: "bot".to_string(),
//!     full_name: "Lunch Bot".to_string(),
//!     password: None,
//! });
//!
//! let actions = machine.feed("PING :irc.example.net\r");
//! assert_eq!(actions, vec![Action::Send(Outbound::Pong(":irc.example.net".to_string()))]);
//! assert_eq!(machine.state(), HandshakeState::AwaitingNick);
//! ```

use crate::message::InboundMessage;
use crate::outbound::Outbound;

/// Handshake progress of one connection.
///
/// Only advances forward; a new connection starts a new machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeState {
    /// Connected at the socket level, nothing received yet.
    #[default]
    Disconnected,
    /// `PASS` step done, `NICK`/`USER` go out on the next line.
    AwaitingNick,
    /// `NICK`/`USER` sent, the next line completes registration.
    Registering,
    /// Fully registered; lines are classified and delivered.
    Connected,
}

/// Identity used during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Desired nickname. Also used to recognize private messages.
    pub nickname: String,
    /// Real name / GECOS.
    pub full_name: String,
    /// Server password, if required.
    pub password: Option<String>,
}

/// Actions produced by the state machine, in the order they must happen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Send this line to the server.
    Send(Outbound),
    /// Registration is complete.
    Connected,
    /// A message was posted to a channel.
    ChannelMessage {
        channel: String,
        user: String,
        text: String,
    },
    /// A message was addressed to this client.
    PrivateMessage { user: String, text: String },
    /// The server is closing the link; the transport must be closed.
    Close(String),
}

/// Sans-IO state machine for one connection.
#[derive(Clone, Debug)]
pub struct ProtocolMachine {
    config: HandshakeConfig,
    state: HandshakeState,
}

impl ProtocolMachine {
    /// Create a machine in [`HandshakeState::Disconnected`].
    #[must_use]
    pub fn new(config: HandshakeConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Disconnected,
        }
    }

    /// Get the current handshake state.
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Nickname this machine registers and answers to.
    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.config.nickname
    }

    /// Feed one raw inbound line.
    #[must_use]
    pub fn feed(&mut self, line: &str) -> Vec<Action> {
        let message = InboundMessage::classify(line, &self.config.nickname);
        let mut actions = Vec::new();

        if let InboundMessage::Ping(token) = &message {
            actions.push(Action::Send(Outbound::Pong(token.clone())));
        }

        match self.state {
            HandshakeState::Disconnected => {
                if let Some(ref password) = self.config.password {
                    actions.push(Action::Send(Outbound::Pass(password.clone())));
                }
                self.state = HandshakeState::AwaitingNick;
            }
            HandshakeState::AwaitingNick => {
                actions.push(Action::Send(Outbound::Nick(self.config.nickname.clone())));
                actions.push(Action::Send(Outbound::User {
                    nickname: self.config.nickname.clone(),
                    full_name: self.config.full_name.clone(),
                }));
                self.state = HandshakeState::Registering;
            }
            HandshakeState::Registering => {
                self.state = HandshakeState::Connected;
                actions.push(Action::Connected);
            }
            HandshakeState::Connected => match message {
                InboundMessage::ChannelMessage {
                    channel,
                    user,
                    text,
                } => actions.push(Action::ChannelMessage {
                    channel,
                    user,
                    text,
                }),
                InboundMessage::PrivateMessage { user, text } => {
                    actions.push(Action::PrivateMessage { user, text })
                }
                InboundMessage::ErrorClosingLink(text) => actions.push(Action::Close(text)),
                InboundMessage::Ping(_) | InboundMessage::Unrecognized(_) => {}
            },
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(password: Option<&str>) -> HandshakeConfig {
        HandshakeConfig {
            nickname: "bot".to_string(),
            full_name: "Lunch Bot".to_string(),
            password: password.map(str::to_string),
        }
    }

    fn sent(actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(out) => Some(out.to_string()),
                _ => None,
            })
            .collect()
    }

    fn connected_machine() -> ProtocolMachine {
        let mut machine = ProtocolMachine::new(make_config(None));
        let _ = machine.feed(":server NOTICE * :hello");
        let _ = machine.feed(":server NOTICE * :looking up your hostname");
        let _ = machine.feed(":server 001 bot :Welcome");
        assert_eq!(machine.state(), HandshakeState::Connected);
        machine
    }

    #[test]
    fn test_handshake_with_password() {
        let mut machine = ProtocolMachine::new(make_config(Some("hunter2")));
        assert_eq!(machine.state(), HandshakeState::Disconnected);

        let first = machine.feed(":server NOTICE * :hello");
        assert_eq!(sent(&first), vec!["PASS hunter2"]);
        assert_eq!(machine.state(), HandshakeState::AwaitingNick);

        let second = machine.feed(":server NOTICE * :checking ident");
        assert_eq!(sent(&second), vec!["NICK bot", "USER bot 8 * :Lunch Bot"]);
        assert_eq!(machine.state(), HandshakeState::Registering);

        let third = machine.feed(":server 001 bot :Welcome");
        assert_eq!(third, vec![Action::Connected]);
        assert_eq!(machine.state(), HandshakeState::Connected);
    }

    #[test]
    fn test_handshake_without_password_sends_nothing_first() {
        let mut machine = ProtocolMachine::new(make_config(None));
        assert!(machine.feed(":server NOTICE * :hello").is_empty());
        assert_eq!(machine.state(), HandshakeState::AwaitingNick);
    }

    #[test]
    fn test_ping_answered_in_every_state() {
        let mut machine = ProtocolMachine::new(make_config(Some("pw")));
        for expected_state in [
            HandshakeState::AwaitingNick,
            HandshakeState::Registering,
            HandshakeState::Connected,
            HandshakeState::Connected,
        ] {
            let actions = machine.feed("PING :x\r");
            let pongs = sent(&actions)
                .into_iter()
                .filter(|l| l.starts_with("PONG"))
                .collect::<Vec<_>>();
            assert_eq!(pongs, vec!["PONG :x"]);
            assert_eq!(actions[0], Action::Send(Outbound::Pong(":x".to_string())));
            assert_eq!(machine.state(), expected_state);
        }
    }

    #[test]
    fn test_connected_delivers_messages() {
        let mut machine = connected_machine();

        assert_eq!(
            machine.feed(":alice!a@h PRIVMSG #lunch :hi\r"),
            vec![Action::ChannelMessage {
                channel: "#lunch".to_string(),
                user: "alice".to_string(),
                text: "hi".to_string(),
            }]
        );
        assert_eq!(
            machine.feed(":alice!a@h PRIVMSG bot :psst"),
            vec![Action::PrivateMessage {
                user: "alice".to_string(),
                text: "psst".to_string(),
            }]
        );
        assert!(machine.feed(":alice!a@h JOIN #lunch").is_empty());
    }

    #[test]
    fn test_closing_link_requests_close() {
        let mut machine = connected_machine();
        assert_eq!(
            machine.feed("ERROR :Closing Link: bot (Quit)"),
            vec![Action::Close("Closing Link: bot (Quit)".to_string())]
        );
    }

    #[test]
    fn test_messages_before_connected_only_advance_handshake() {
        let mut machine = ProtocolMachine::new(make_config(None));
        let _ = machine.feed(":server NOTICE * :hello");
        let _ = machine.feed(":server NOTICE * :hello again");
        let actions = machine.feed(":alice!a@h PRIVMSG #lunch :early");
        assert_eq!(actions, vec![Action::Connected]);
    }
}
