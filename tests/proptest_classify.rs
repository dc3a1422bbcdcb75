//! Property-based tests for line classification and the protocol machine.
//!
//! Uses proptest to generate random lines and verify that:
//! 1. Classification never panics, whatever the input
//! 2. Well-formed channel and private messages are recovered exactly
//! 3. Every PING is answered with its token echoed verbatim

use proptest::prelude::*;
use slirc_bot::state::Action;
use slirc_bot::{HandshakeConfig, InboundMessage, LineCodec, Outbound, ProtocolMachine};

const NICK: &str = "lunchbot";

// =============================================================================
// STRATEGIES
// =============================================================================

fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

fn hostname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]+(\\.[a-z0-9]+)*").expect("valid regex")
}

fn channel_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("#[a-zA-Z0-9_\\-]{1,49}").expect("valid regex")
}

/// Message text without CR, LF or NUL.
fn message_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex")
}

/// PING token as servers send it: a bare word or a colon-prefixed trailing.
fn ping_token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-zA-Z0-9.]{1,30}").expect("valid regex"),
        prop::string::string_regex(":[a-zA-Z0-9. ]{0,30}").expect("valid regex"),
    ]
}

fn machine() -> ProtocolMachine {
    ProtocolMachine::new(HandshakeConfig {
        nickname: NICK.to_string(),
        full_name: "Lunch Bot".to_string(),
        password: None,
    })
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn classify_never_panics(line in "\\PC{0,600}") {
        let _ = InboundMessage::classify(&line, NICK);
        let _ = LineCodec::sanitize(&line);
    }

    #[test]
    fn channel_message_recovered(
        user in nickname_strategy(),
        host in hostname_strategy(),
        channel in channel_strategy(),
        text in message_text_strategy(),
        cr in any::<bool>(),
    ) {
        let line = format!(
            ":{}!u@{} PRIVMSG {} :{}{}",
            user, host, channel, text, if cr { "\r" } else { "" }
        );
        prop_assert_eq!(
            InboundMessage::classify(&line, NICK),
            InboundMessage::ChannelMessage { channel, user, text }
        );
    }

    #[test]
    fn private_message_recovered(
        user in nickname_strategy(),
        host in hostname_strategy(),
        text in message_text_strategy(),
    ) {
        let line = format!(":{}!u@{} PRIVMSG {} :{}\r", user, host, NICK, text);
        prop_assert_eq!(
            InboundMessage::classify(&line, NICK),
            InboundMessage::PrivateMessage { user, text }
        );
    }

    #[test]
    fn ping_always_answered_first(
        token in ping_token_strategy(),
        preamble in 0usize..5,
    ) {
        let mut machine = machine();
        for i in 0..preamble {
            let _ = machine.feed(&format!(":irc.test NOTICE * :line {}", i));
        }

        let actions = machine.feed(&format!("PING {}\r", token));
        prop_assert_eq!(
            actions.first(),
            Some(&Action::Send(Outbound::Pong(token.clone())))
        );
        let pongs = actions
            .iter()
            .filter(|a| matches!(a, Action::Send(Outbound::Pong(_))))
            .count();
        prop_assert_eq!(pongs, 1);
    }
}
