//! Predicate-based command registration and dispatch.
//!
//! A bot's commands are an ordered list of (predicate, handler, doc)
//! triples built once with [`CommandSet::builder`]. Dispatch evaluates the
//! predicates in registration order and runs the first handler whose
//! predicate matches; later commands are not consulted.
//!
//! ```
//! use slirc_bot::command::CommandSet;
//!
//! struct Snacks(u32);
//!
//! let commands = CommandSet::builder()
//!     .command("snack", Some("Count a snack"), |state: &mut Snacks, _ctx, _req| {
//!         state.0 += 1;
//!         Ok(Some(format!("{} snacks so far", state.0)))
//!     })
//!     .response("botsnack", |_state: &mut Snacks, _ctx, _req| Ok(Some(":)".to_string())))
//!     .help()
//!     .build();
//!
//! assert_eq!(commands.len(), 3);
//! assert_eq!(
//!     commands.help_text(),
//!     "I know the following commands: %snack: Count a snack. %help: Show this message"
//! );
//! ```

mod predicate;
mod registry;

pub use self::predicate::{Predicate, Request, COMMAND_PREFIX};
pub use self::registry::{
    help_text, Command, CommandSet, CommandSetBuilder, DispatchFailure, HandlerFn, HandlerResult,
};
