//! Inbound message grammar.
//!
//! Each received line is tokenized once by a nom parser and classified into
//! an [`InboundMessage`], which the engine then matches exhaustively.

mod inbound;
mod nom_parser;

pub use self::inbound::{InboundMessage, CLOSING_LINK};
pub use self::nom_parser::ParsedLine;
