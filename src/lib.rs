//! # slirc-bot
//!
//! A small engine for writing IRC bots.
//!
//! ## Features
//!
//! - Line-oriented transport over TCP or TLS, with a nom-based line classifier
//! - Automatic registration, `PING`/`PONG` handling and channel rejoining
//! - Traffic-driven keepalive and reconnection with exponential backoff
//! - Ordered, predicate-based command dispatch with built-in `%help`
//! - In-channel error reporting, deduplicated per failure
//!
//! Everything runs on one task: handlers are plain synchronous functions
//! and never race each other.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ```no_run
//! use slirc_bot::{Bot, Client, ClientConfig, CommandSet, HandshakeConfig};
//! use slirc_bot::{ServerAddr, ServerConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let commands = CommandSet::builder()
//!     .command("ping", Some("Check that I'm alive"), |_: &mut (), _, _| {
//!         Ok(Some("pong".to_string()))
//!     })
//!     .help()
//!     .build();
//!
//! let mut bot = Bot::new("pingbot", commands, ()).with_channels(["bots"]);
//!
//! let connector = ServerConnector::new(ServerAddr {
//!     host: "irc.example.net".to_string(),
//!     port: 6667,
//!     tls: false,
//! });
//! let mut client = Client::new(
//!     connector,
//!     ClientConfig::new(HandshakeConfig {
//!         nickname: "pingbot".to_string(),
//!         full_name: "Ping Bot".to_string(),
//!         password: None,
//!     }),
//! );
//! client.run(&mut bot, CancellationToken::new()).await;
//! # }
//! ```

pub mod bot;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod failures;
pub mod keepalive;
pub mod line;
pub mod message;
pub mod outbound;
pub mod reconnect;
pub mod state;
pub mod transport;

pub use self::bot::{Bot, Context, Personality};
pub use self::client::{Client, ClientConfig, CloseReason, Events, Outbox};
pub use self::command::{CommandSet, HandlerResult, Predicate, Request};
pub use self::config::{Config, ConfigError};
pub use self::error::{ConnectionError, HandlerError, ProtocolError};
pub use self::failures::{FailureCache, FailureSignature};
pub use self::line::LineCodec;
pub use self::message::InboundMessage;
pub use self::outbound::Outbound;
pub use self::reconnect::{Backoff, Supervisor};
pub use self::state::{HandshakeConfig, HandshakeState, ProtocolMachine};
pub use self::transport::{Connector, ServerAddr, ServerConnector, Transport};
