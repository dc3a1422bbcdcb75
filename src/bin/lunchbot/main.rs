//! lunchbot: an IRC bot that keeps lunch timers.
//!
//! Usage: `lunchbot [config.toml]` (default `lunchbot.toml`). Logging is
//! controlled with `RUST_LOG`.

mod timers;

use std::time::Duration;

use anyhow::Context as _;
use rand::seq::SliceRandom;
use slirc_bot::{
    Bot, Client, CommandSet, Config, Context, HandlerResult, Request, ServerConnector,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::timers::{StartError, Timers};

const SNACK_REPLIES: [&str; 4] = [":)", ":3", "thanks!", "tasty!"];
const DONE_WORDS: [&str; 3] = ["done", "ready", "finished"];

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lunchbot.toml".to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    info!(
        server = %config.server.host,
        port = config.server.port,
        tls = config.server.tls,
        nickname = %config.bot.nickname,
        "starting lunchbot"
    );

    let mut bot = Bot::new(config.bot.nickname.clone(), commands(), Timers::default())
        .with_owner(config.bot.owner.clone())
        .with_channels(&config.bot.channels)
        .with_failure_capacity(config.failure_capacity());

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    let mut client = Client::new(
        ServerConnector::new(config.server_addr()),
        config.client_config(),
    );
    client.run(&mut bot, shutdown).await;

    info!("lunchbot stopped");
    Ok(())
}

fn commands() -> CommandSet<Timers> {
    CommandSet::builder()
        .response("botsnack", botsnack)
        .response("<3", heart)
        .command("time", Some("Add a timer"), add_timer)
        .command("list", Some("List all your timers"), list_timers)
        .command("cancel", Some("Cancels a timer"), cancel_timer)
        .help()
        .build()
}

fn botsnack(_: &mut Timers, _: &mut Context<'_>, _: &Request<'_>) -> HandlerResult {
    let reply = SNACK_REPLIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(":)");
    Ok(Some(reply.to_string()))
}

fn heart(_: &mut Timers, _: &mut Context<'_>, _: &Request<'_>) -> HandlerResult {
    Ok(Some("<3".to_string()))
}

fn add_timer(timers: &mut Timers, _: &mut Context<'_>, req: &Request<'_>) -> HandlerResult {
    let (minutes, label) = req.text.split_once(' ').unwrap_or((req.text, ""));
    let Ok(minutes) = minutes.parse::<i64>() else {
        return Ok(Some(format!("'{}' is not an integer", minutes)));
    };

    let word = DONE_WORDS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("done");
    let announcement = format!("{} is {}", label, word);
    let duration = Duration::from_secs(minutes.max(0).unsigned_abs().saturating_mul(60));

    match timers.start(req.user, label, duration, req.channel, announcement) {
        Ok(()) => Ok(Some(format!(
            "okay! starting {} minute timer for '{}'.",
            minutes, label
        ))),
        Err(StartError::AlreadyRunning) => {
            Ok(Some(format!("there is already a timer for '{}'", label)))
        }
        Err(StartError::OutOfRange) => {
            Ok(Some(format!("{} minutes is too long to wait", minutes)))
        }
    }
}

fn list_timers(timers: &mut Timers, _: &mut Context<'_>, req: &Request<'_>) -> HandlerResult {
    let remaining = timers.remaining(req.user, Instant::now());
    if remaining.is_empty() {
        return Ok(Some("you have no timers running.".to_string()));
    }
    let entries: Vec<String> = remaining
        .into_iter()
        .map(|(label, left)| {
            let secs = left.as_secs();
            format!("'{}' in {:02}:{:02}", label, secs / 60, secs % 60)
        })
        .collect();
    Ok(Some(format!(
        "you have the following timers: {}",
        entries.join(", ")
    )))
}

fn cancel_timer(timers: &mut Timers, _: &mut Context<'_>, req: &Request<'_>) -> HandlerResult {
    if timers.cancel(req.user, req.text) {
        Ok(Some(format!("Okay, removing timer for '{}'.", req.text)))
    } else {
        Ok(Some(format!("you don't have a timer for '{}'!", req.text)))
    }
}
