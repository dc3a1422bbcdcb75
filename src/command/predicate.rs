use std::fmt;

use crate::error::HandlerError;

/// Sigil that introduces a `command` trigger.
pub const COMMAND_PREFIX: char = '%';

/// An inbound message as seen by predicates and handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request<'a> {
    /// Channel the message was posted to; `None` for private messages.
    pub channel: Option<&'a str>,
    /// Nickname of the sender.
    pub user: &'a str,
    /// Message text. For `command` handlers, the argument after the trigger.
    pub text: &'a str,
}

type CustomPredicate = Box<dyn Fn(&str, &Request<'_>) -> Result<bool, HandlerError>>;

/// Boolean test deciding whether a command handles a message.
pub enum Predicate {
    /// First whitespace-delimited token equals `%trigger`.
    Command(String),
    /// Message starts with the bot's nickname and contains the trigger.
    Response(String),
    /// Message contains the trigger anywhere.
    Unrequested(String),
    /// Arbitrary test over the bot's nickname and the request.
    Custom(CustomPredicate),
}

impl Predicate {
    pub fn command(trigger: &str) -> Self {
        Self::Command(format!("{}{}", COMMAND_PREFIX, trigger))
    }

    pub fn response(trigger: &str) -> Self {
        Self::Response(trigger.to_string())
    }

    pub fn unrequested(trigger: &str) -> Self {
        Self::Unrequested(trigger.to_string())
    }

    pub fn custom<F>(test: F) -> Self
    where
        F: Fn(&str, &Request<'_>) -> Result<bool, HandlerError> + 'static,
    {
        Self::Custom(Box::new(test))
    }

    /// Evaluate against a request addressed to a bot called `nickname`.
    pub fn matches(&self, nickname: &str, request: &Request<'_>) -> Result<bool, HandlerError> {
        let text = request.text;
        match self {
            Self::Command(token) => Ok(text.split_whitespace().next() == Some(token.as_str())),
            Self::Response(trigger) => {
                Ok(text.starts_with(nickname) && text.contains(trigger.as_str()))
            }
            Self::Unrequested(trigger) => Ok(text.contains(trigger.as_str())),
            Self::Custom(test) => test(nickname, request),
        }
    }

    /// Text handed to the handler once this predicate has matched.
    ///
    /// `command` handlers get the remainder after the trigger token, trimmed;
    /// every other kind gets the full message.
    pub fn argument<'t>(&self, text: &'t str) -> &'t str {
        match self {
            Self::Command(token) => text
                .trim_start()
                .strip_prefix(token.as_str())
                .unwrap_or(text)
                .trim(),
            _ => text,
        }
    }

    /// Trigger token for `command` predicates (`%trigger`), used in docs.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Command(token) => Some(token),
            _ => None,
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(token) => f.debug_tuple("Command").field(token).finish(),
            Self::Response(trigger) => f.debug_tuple("Response").field(trigger).finish(),
            Self::Unrequested(trigger) => f.debug_tuple("Unrequested").field(trigger).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(token) => f.write_str(token),
            Self::Response(trigger) => write!(f, "response({})", trigger),
            Self::Unrequested(trigger) => write!(f, "unrequested({})", trigger),
            Self::Custom(_) => f.write_str("custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> Request<'_> {
        Request {
            channel: Some("#lunch"),
            user: "alice",
            text,
        }
    }

    #[test]
    fn test_command_matches_exact_token() {
        let time = Predicate::command("time");
        assert!(time.matches("bot", &request("%time 5 coffee")).unwrap());
        assert!(time.matches("bot", &request("  %time")).unwrap());
        assert!(!time.matches("bot", &request("%timer 5 coffee")).unwrap());
        assert!(!time.matches("bot", &request("time 5 coffee")).unwrap());
        assert!(!time.matches("bot", &request("")).unwrap());
    }

    #[test]
    fn test_command_argument_is_trimmed_remainder() {
        let time = Predicate::command("time");
        assert_eq!(time.argument("%time 5 coffee"), "5 coffee");
        assert_eq!(time.argument("  %time   5  coffee  "), "5  coffee");
        assert_eq!(time.argument("%time"), "");
    }

    #[test]
    fn test_response_requires_addressing() {
        let joke = Predicate::response("joke");
        assert!(joke.matches("bot", &request("bot: tell me a joke")).unwrap());
        assert!(!joke.matches("bot", &request("tell bot a joke")).unwrap());
        assert_eq!(joke.argument("bot: tell me a joke"), "bot: tell me a joke");
    }

    #[test]
    fn test_unrequested_matches_anywhere() {
        let joke = Predicate::unrequested("joke");
        assert!(joke.matches("bot", &request("tell bot a joke")).unwrap());
        assert!(joke.matches("bot", &request("bot: tell me a joke")).unwrap());
        assert!(!joke.matches("bot", &request("tell me a story")).unwrap());
    }

    #[test]
    fn test_custom_predicate_can_fail() {
        let picky = Predicate::custom(|_nick, req| {
            if req.text.is_empty() {
                Err(HandlerError::failed("empty"))
            } else {
                Ok(req.user == "alice")
            }
        });
        assert!(picky.matches("bot", &request("hi")).unwrap());
        assert_eq!(
            picky.matches("bot", &request("")),
            Err(HandlerError::failed("empty"))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Predicate::command("help").to_string(), "%help");
        assert_eq!(Predicate::response("<3").to_string(), "response(<3)");
    }
}
