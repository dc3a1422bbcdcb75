//! Outbound verbs.
//!
//! The engine only ever emits a handful of commands. Each renders to a
//! single protocol line without its terminator; [`LineCodec`](crate::line::LineCodec)
//! appends `\r\n` on the way out.

use std::fmt::{self, Write};

use crate::line::MAX_LINE_LEN;

/// A command sent to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// `PASS password`
    Pass(String),
    /// `NICK nickname`
    Nick(String),
    /// `USER nickname 8 * :full name`
    User { nickname: String, full_name: String },
    /// `JOIN #channel`
    Join(String),
    /// `PRIVMSG target :text`, one line of text
    Privmsg { target: String, text: String },
    /// `PONG token`, token echoed verbatim
    Pong(String),
    /// `QUIT :text`
    Quit(String),
}

impl Outbound {
    /// `JOIN`, prefixing the channel with `#` if it is missing.
    pub fn join(channel: &str) -> Self {
        Self::Join(canonical_channel(channel))
    }

    /// One `PRIVMSG` per `\n`-separated segment of `text`. A segment that
    /// would not fit in one protocol line is split across several.
    pub fn privmsg(target: &str, text: &str) -> Vec<Self> {
        let budget = privmsg_text_budget(target);
        text.split('\n')
            .flat_map(|line| split_to_fit(line.trim_end_matches('\r'), budget))
            .map(|chunk| Self::Privmsg {
                target: target.to_string(),
                text: chunk.to_string(),
            })
            .collect()
    }
}

/// Bytes of text left in a `PRIVMSG` to `target` once the command, the
/// target and the `\r\n` terminator are accounted for.
fn privmsg_text_budget(target: &str) -> usize {
    MAX_LINE_LEN.saturating_sub("PRIVMSG ".len() + target.len() + " :".len() + 2)
}

/// Cut `text` into pieces of at most `max` bytes on char boundaries.
fn split_to_fit(mut text: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    while text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            break;
        }
        let (head, rest) = text.split_at(end);
        chunks.push(head);
        text = rest;
    }
    chunks.push(text);
    chunks
}

/// Canonical channel form: always begins with `#`.
pub fn canonical_channel(channel: &str) -> String {
    if channel.starts_with('#') {
        channel.to_string()
    } else {
        format!("#{}", channel)
    }
}

/// Write a command whose last argument is always colon-prefixed.
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    match args.split_last() {
        Some((suffix, middle)) => {
            f.write_str(cmd)?;
            for arg in middle {
                f.write_char(' ')?;
                f.write_str(arg)?;
            }
            f.write_str(" :")?;
            f.write_str(suffix)
        }
        None => f.write_str(cmd),
    }
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass(password) => write!(f, "PASS {}", password),
            Self::Nick(nickname) => write!(f, "NICK {}", nickname),
            Self::User {
                nickname,
                full_name,
            } => write_cmd_freeform(
                f,
                "USER",
                &[nickname.as_str(), "8", "*", full_name.as_str()],
            ),
            Self::Join(channel) => write!(f, "JOIN {}", channel),
            Self::Privmsg { target, text } => {
                write_cmd_freeform(f, "PRIVMSG", &[target.as_str(), text.as_str()])
            }
            Self::Pong(token) => write!(f, "PONG {}", token),
            Self::Quit(text) => write_cmd_freeform(f, "QUIT", &[text.as_str()]),
        }
    }
}

impl From<Outbound> for String {
    fn from(out: Outbound) -> Self {
        out.to_string()
    }
}
