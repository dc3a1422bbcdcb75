use super::nom_parser::ParsedLine;

/// Marker a server puts in the `ERROR` notice that ends a connection.
pub const CLOSING_LINK: &str = "Closing Link";

/// One received line, classified.
///
/// Produced once per line and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// `PING <token>`; the token is kept verbatim (including any leading `:`)
    /// so the `PONG` can echo it exactly.
    Ping(String),
    /// `:<user>!<host> PRIVMSG #<channel> :<text>`
    ChannelMessage {
        channel: String,
        user: String,
        text: String,
    },
    /// `:<user>!<host> PRIVMSG <own nick> :<text>`
    PrivateMessage { user: String, text: String },
    /// `ERROR :<text>` where the text contains `Closing Link`.
    ErrorClosingLink(String),
    /// Anything else; dropped by the engine.
    Unrecognized(String),
}

impl InboundMessage {
    /// Classify a raw line as received for the client named `nickname`.
    ///
    /// Tolerates a trailing `\r`. Precedence follows the message grammars:
    /// ping, channel message, private message, closing-link error, and
    /// finally unrecognized.
    ///
    /// Command names are matched case-insensitively, so `ping :x` is
    /// answered like `PING :x`.
    pub fn classify(line: &str, nickname: &str) -> Self {
        let Some(parsed) = ParsedLine::parse(line) else {
            return Self::unrecognized(line);
        };

        match parsed.command.to_ascii_uppercase().as_str() {
            "PING" if parsed.prefix.is_none() && !parsed.rest.is_empty() => {
                Self::Ping(parsed.rest.to_string())
            }
            "PRIVMSG" => Self::classify_privmsg(&parsed, line, nickname),
            "ERROR" => match parsed.params.first() {
                Some(text) if text.contains(CLOSING_LINK) => {
                    Self::ErrorClosingLink((*text).to_string())
                }
                _ => Self::unrecognized(line),
            },
            _ => Self::unrecognized(line),
        }
    }

    fn classify_privmsg(parsed: &ParsedLine<'_>, line: &str, nickname: &str) -> Self {
        let (Some(user), [target, text]) = (parsed.source_nick(), parsed.params.as_slice()) else {
            return Self::unrecognized(line);
        };

        if target.starts_with('#') && target.len() > 1 {
            Self::ChannelMessage {
                channel: (*target).to_string(),
                user: user.to_string(),
                text: (*text).to_string(),
            }
        } else if *target == nickname {
            Self::PrivateMessage {
                user: user.to_string(),
                text: (*text).to_string(),
            }
        } else {
            Self::unrecognized(line)
        }
    }

    fn unrecognized(line: &str) -> Self {
        Self::Unrecognized(line.to_string())
    }
}
