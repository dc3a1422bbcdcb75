//! Nom-based line tokenizer.
//!
//! Splits one raw protocol line into prefix, command and parameters in a
//! single pass, borrowing from the input.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, space0},
    combinator::opt,
    error::{context, VerboseError},
    sequence::preceded,
    IResult,
};

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        preceded(char(':'), take_while1(|c| c != ' ')),
    )(input)
}

/// Parse the command name (alphanumeric characters).
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing command",
        take_while1(|c: char| c.is_alphanumeric()),
    )(input)
}

/// Parse a complete line into its components.
///
/// ```text
/// [:prefix] <command> [params...] [:trailing]
/// ```
pub fn parse_line(input: &str) -> ParseResult<&str, ParsedLine<'_>> {
    let (input, prefix) = context("parsing optional prefix", opt(parse_prefix))(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = context("parsing required command", parse_command)(input)?;

    let rest = input.strip_prefix(' ').unwrap_or(input);
    let rest = rest.trim_end_matches(['\r', '\n']);

    let mut params: Vec<&str> = Vec::new();
    let mut remaining = input;

    while let Some(b' ') = remaining.as_bytes().first().copied() {
        remaining = &remaining[1..];

        if let Some(b':') = remaining.as_bytes().first().copied() {
            // Trailing parameter runs to the end of the line
            let after_colon = &remaining[1..];
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            remaining = &after_colon[end..];
            break;
        }

        let end = remaining
            .find([' ', '\r', '\n'])
            .unwrap_or(remaining.len());
        let param = &remaining[..end];
        if param.is_empty() {
            continue;
        }
        params.push(param);
        remaining = &remaining[end..];
    }

    Ok((
        remaining,
        ParsedLine {
            prefix,
            command,
            params,
            rest,
        },
    ))
}

/// A tokenized line with borrowed string slices.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine<'a> {
    /// Raw prefix (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: Vec<&'a str>,
    /// Everything after the command, verbatim, minus line terminators.
    pub rest: &'a str,
}

impl<'a> ParsedLine<'a> {
    /// Tokenize a line. Returns `None` if no command can be found.
    pub fn parse(input: &'a str) -> Option<Self> {
        parse_line(input).ok().map(|(_, line)| line)
    }

    /// Nickname portion of a `nick!user@host` prefix.
    ///
    /// Returns `None` for server prefixes, which carry no `!`.
    pub fn source_nick(&self) -> Option<&'a str> {
        let (nick, _) = self.prefix?.split_once('!')?;
        (!nick.is_empty()).then_some(nick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let line = ParsedLine::parse("PING").unwrap();
        assert_eq!(line.command, "PING");
        assert!(line.prefix.is_none());
        assert!(line.params.is_empty());
        assert_eq!(line.rest, "");
    }

    #[test]
    fn test_parse_with_prefix() {
        let line = ParsedLine::parse(":nick!user@host PRIVMSG #channel :Hello there").unwrap();
        assert_eq!(line.prefix, Some("nick!user@host"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#channel", "Hello there"]);
        assert_eq!(line.source_nick(), Some("nick"));
    }

    #[test]
    fn test_parse_with_crlf() {
        let line = ParsedLine::parse("PING :server\r").unwrap();
        assert_eq!(line.command, "PING");
        assert_eq!(line.params, vec!["server"]);
        assert_eq!(line.rest, ":server");
    }

    #[test]
    fn test_parse_multiple_params() {
        let line = ParsedLine::parse("USER guest 8 * :Real Name").unwrap();
        assert_eq!(line.command, "USER");
        assert_eq!(line.params, vec!["guest", "8", "*", "Real Name"]);
    }

    #[test]
    fn test_parse_numeric() {
        let line = ParsedLine::parse(":server 001 nick :Welcome").unwrap();
        assert_eq!(line.prefix, Some("server"));
        assert_eq!(line.command, "001");
        assert_eq!(line.source_nick(), None);
    }

    #[test]
    fn test_parse_collapses_repeated_spaces() {
        let line = ParsedLine::parse("PRIVMSG  #channel  :hi").unwrap();
        assert_eq!(line.params, vec!["#channel", "hi"]);
    }

    #[test]
    fn test_parse_empty_trailing() {
        let line = ParsedLine::parse("PRIVMSG #channel :").unwrap();
        assert_eq!(line.params, vec!["#channel", ""]);
    }

    #[test]
    fn test_parse_rejects_missing_command() {
        assert!(ParsedLine::parse("").is_none());
        assert!(ParsedLine::parse(":prefix-only").is_none());
    }
}
