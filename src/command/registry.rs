use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::info;

use super::predicate::{Predicate, Request};
use crate::bot::Context;
use crate::error::HandlerError;
use crate::failures::FailureSignature;

/// What a handler returns: an optional reply, or a failure.
///
/// `Ok(None)` and `Ok(Some(""))` both mean "send nothing".
pub type HandlerResult = Result<Option<String>, HandlerError>;

/// Boxed command handler over bot state `S`.
pub type HandlerFn<S> = Box<dyn Fn(&mut S, &mut Context<'_>, &Request<'_>) -> HandlerResult>;

enum Handler<S> {
    Custom(HandlerFn<S>),
    Help,
}

/// One registered command.
pub struct Command<S> {
    predicate: Predicate,
    handler: Handler<S>,
    doc: Option<String>,
}

impl<S> Command<S> {
    pub fn new<F>(predicate: Predicate, handler: F) -> Self
    where
        F: Fn(&mut S, &mut Context<'_>, &Request<'_>) -> HandlerResult + 'static,
    {
        Self {
            predicate,
            handler: Handler::Custom(Box::new(handler)),
            doc: None,
        }
    }

    /// Attach a documentation entry to this command.
    ///
    /// For `command` predicates the entry reads `%trigger: doc`; for other
    /// predicates the doc is used as-is.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        let doc = doc.into();
        self.doc = Some(match self.predicate.token() {
            Some(token) if doc.is_empty() => token.to_string(),
            Some(token) => format!("{}: {}", token, doc),
            None => doc,
        });
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }
}

impl<S> fmt::Debug for Command<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("predicate", &self.predicate)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

/// A failed predicate or handler, tagged with the command it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchFailure {
    /// Display form of the failing command's predicate.
    pub command: String,
    pub error: HandlerError,
}

impl DispatchFailure {
    /// Key under which this failure is deduplicated.
    pub fn signature(&self) -> FailureSignature {
        FailureSignature::new(&self.command, &self.error)
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.command, self.error)
    }
}

/// Ordered, immutable set of commands.
pub struct CommandSet<S> {
    commands: Vec<Command<S>>,
    help: String,
}

impl<S> CommandSet<S> {
    pub fn builder() -> CommandSetBuilder<S> {
        CommandSetBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Text the built-in help command replies with.
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// Run the first command whose predicate matches `request`.
    ///
    /// A non-empty reply goes back through [`Context::reply`], one message
    /// per line. Returns whether any command matched. Panics inside
    /// predicates or handlers are caught and reported as
    /// [`HandlerError::Panicked`].
    pub fn dispatch(
        &self,
        state: &mut S,
        ctx: &mut Context<'_>,
        request: &Request<'_>,
    ) -> Result<bool, DispatchFailure> {
        for command in &self.commands {
            let matched = guarded(|| command.predicate.matches(ctx.nickname(), request))
                .map_err(|error| failure(command, error))?;
            if !matched {
                continue;
            }

            info!(
                "responding to {} <{}> {}",
                request.channel.unwrap_or("(private)"),
                request.user,
                request.text
            );

            let scoped = Request {
                text: command.predicate.argument(request.text),
                ..*request
            };
            let reply = match &command.handler {
                Handler::Help => Ok(Some(self.help.clone())),
                Handler::Custom(handler) => guarded(|| handler(state, ctx, &scoped)),
            }
            .map_err(|error| failure(command, error))?;

            if let Some(reply) = reply.filter(|r| !r.is_empty()) {
                ctx.reply(request.channel, request.user, &reply);
            }
            return Ok(true);
        }
        Ok(false)
    }
}

impl<S> fmt::Debug for CommandSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSet")
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

fn failure<S>(command: &Command<S>, error: HandlerError) -> DispatchFailure {
    DispatchFailure {
        command: command.predicate.to_string(),
        error,
    }
}

fn guarded<T>(f: impl FnOnce() -> Result<T, HandlerError>) -> Result<T, HandlerError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Help reply built from documentation entries in registration order.
pub fn help_text<'a>(docs: impl IntoIterator<Item = &'a str>, command_count: usize) -> String {
    let docs: Vec<&str> = docs.into_iter().collect();
    if !docs.is_empty() {
        format!("I know the following commands: {}", docs.join(". "))
    } else if command_count > 0 {
        "I know some commands, but have no documentation. :-(".to_string()
    } else {
        "I know no commands.".to_string()
    }
}

/// Builder for [`CommandSet`].
pub struct CommandSetBuilder<S> {
    commands: Vec<Command<S>>,
}

impl<S> Default for CommandSetBuilder<S> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

impl<S> CommandSetBuilder<S> {
    /// Register a `%trigger` command.
    ///
    /// Its help entry is `%trigger`, or `%trigger: doc` when a doc is given.
    pub fn command<F>(self, trigger: &str, doc: Option<&str>, handler: F) -> Self
    where
        F: Fn(&mut S, &mut Context<'_>, &Request<'_>) -> HandlerResult + 'static,
    {
        let command = Command::new(Predicate::command(trigger), handler);
        self.register(command.with_doc(doc.unwrap_or_default()))
    }

    /// Register a handler for messages addressed to the bot containing `trigger`.
    pub fn response<F>(self, trigger: &str, handler: F) -> Self
    where
        F: Fn(&mut S, &mut Context<'_>, &Request<'_>) -> HandlerResult + 'static,
    {
        self.register(Command::new(Predicate::response(trigger), handler))
    }

    /// Register a handler for any message containing `trigger`.
    pub fn unrequested<F>(self, trigger: &str, handler: F) -> Self
    where
        F: Fn(&mut S, &mut Context<'_>, &Request<'_>) -> HandlerResult + 'static,
    {
        self.register(Command::new(Predicate::unrequested(trigger), handler))
    }

    /// Register the built-in `%help` command.
    pub fn help(mut self) -> Self {
        self.commands.push(Command {
            predicate: Predicate::command("help"),
            handler: Handler::Help,
            doc: Some("%help: Show this message".to_string()),
        });
        self
    }

    pub fn register(mut self, command: Command<S>) -> Self {
        self.commands.push(command);
        self
    }

    pub fn build(self) -> CommandSet<S> {
        let help = help_text(
            self.commands.iter().filter_map(Command::doc),
            self.commands.len(),
        );
        CommandSet {
            commands: self.commands,
            help,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::client::Outbox;

    #[derive(Default)]
    struct Calls(Vec<&'static str>);

    fn run(
        commands: &CommandSet<Calls>,
        state: &mut Calls,
        channel: Option<&str>,
        text: &str,
    ) -> (Result<bool, DispatchFailure>, Vec<String>) {
        let mut channels = BTreeSet::new();
        let mut out = Outbox::new();
        let result = {
            let mut ctx = Context::new("bot", &mut channels, &mut out);
            let request = Request {
                channel,
                user: "alice",
                text,
            };
            commands.dispatch(state, &mut ctx, &request)
        };
        let lines = out.lines().iter().map(ToString::to_string).collect();
        (result, lines)
    }

    #[test]
    fn test_first_match_wins() {
        let commands = CommandSet::builder()
            .unrequested("joke", |s: &mut Calls, _, _| {
                s.0.push("first");
                Ok(Some("ha".to_string()))
            })
            .response("joke", |s: &mut Calls, _, _| {
                s.0.push("second");
                Ok(Some("ho".to_string()))
            })
            .build();
        let mut state = Calls::default();

        let (result, lines) = run(&commands, &mut state, Some("#lunch"), "bot: tell me a joke");
        assert_eq!(result, Ok(true));
        assert_eq!(state.0, vec!["first"]);
        assert_eq!(lines, vec!["PRIVMSG #lunch :alice: ha"]);
    }

    #[test]
    fn test_command_receives_argument() {
        let commands = CommandSet::builder()
            .command("echo", None, |_: &mut Calls, _, req| Ok(Some(req.text.to_string())))
            .build();
        let mut state = Calls::default();

        let (_, lines) = run(&commands, &mut state, None, "%echo  hello world ");
        assert_eq!(lines, vec!["PRIVMSG alice :hello world"]);
    }

    #[test]
    fn test_multiline_reply_and_empty_reply() {
        let commands = CommandSet::builder()
            .command("two", None, |_: &mut Calls, _, _| Ok(Some("a\nb".to_string())))
            .command("none", None, |_: &mut Calls, _, _| Ok(Some(String::new())))
            .build();
        let mut state = Calls::default();

        let (_, lines) = run(&commands, &mut state, Some("#lunch"), "%two");
        assert_eq!(lines, vec!["PRIVMSG #lunch :alice: a", "PRIVMSG #lunch :b"]);

        let (result, lines) = run(&commands, &mut state, Some("#lunch"), "%none");
        assert_eq!(result, Ok(true));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_no_match() {
        let commands = CommandSet::builder()
            .command("echo", None, |_: &mut Calls, _, _| Ok(None))
            .build();
        let mut state = Calls::default();
        let (result, lines) = run(&commands, &mut state, Some("#lunch"), "hello");
        assert_eq!(result, Ok(false));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_handler_error_is_reported() {
        let commands = CommandSet::builder()
            .command("boom", None, |_: &mut Calls, _, _| Err(HandlerError::failed("no")))
            .build();
        let mut state = Calls::default();
        let (result, lines) = run(&commands, &mut state, Some("#lunch"), "%boom");
        let failure = result.unwrap_err();
        assert_eq!(failure.command, "%boom");
        assert_eq!(failure.error, HandlerError::failed("no"));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_handler_panic_is_caught() {
        let commands = CommandSet::builder()
            .command("panic", None, |_: &mut Calls, _, _| panic!("kaboom"))
            .build();
        let mut state = Calls::default();
        let (result, _) = run(&commands, &mut state, Some("#lunch"), "%panic");
        assert_eq!(
            result.unwrap_err().error,
            HandlerError::Panicked("kaboom".to_string())
        );
    }

    #[test]
    fn test_predicate_error_stops_dispatch() {
        let commands = CommandSet::builder()
            .register(Command::new(
                Predicate::custom(|_, _| Err(HandlerError::failed("bad predicate"))),
                |s: &mut Calls, _, _| {
                    s.0.push("custom");
                    Ok(None)
                },
            ))
            .unrequested("x", |s: &mut Calls, _, _| {
                s.0.push("later");
                Ok(None)
            })
            .build();
        let mut state = Calls::default();
        let (result, _) = run(&commands, &mut state, Some("#lunch"), "x");
        assert_eq!(result.unwrap_err().command, "custom");
        assert!(state.0.is_empty());
    }

    #[test]
    fn test_help_text_variants() {
        let empty: CommandSet<Calls> = CommandSet::builder().build();
        assert_eq!(empty.help_text(), "I know no commands.");

        let undocumented = CommandSet::builder()
            .response("<3", |_: &mut Calls, _, _| Ok(None))
            .build();
        assert_eq!(
            undocumented.help_text(),
            "I know some commands, but have no documentation. :-("
        );

        let documented = CommandSet::builder()
            .command("time", Some("Add a timer"), |_: &mut Calls, _, _| Ok(None))
            .command("list", None, |_: &mut Calls, _, _| Ok(None))
            .help()
            .build();
        assert_eq!(
            documented.help_text(),
            "I know the following commands: %time: Add a timer. %list. %help: Show this message"
        );
    }

    #[test]
    fn test_help_replies_with_docs() {
        let commands = CommandSet::builder()
            .command("time", Some("Add a timer"), |_: &mut Calls, _, _| Ok(None))
            .help()
            .build();
        let mut state = Calls::default();
        let (_, lines) = run(&commands, &mut state, None, "%help");
        assert_eq!(
            lines,
            vec!["PRIVMSG alice :I know the following commands: %time: Add a timer. %help: Show this message"]
        );
    }
}
