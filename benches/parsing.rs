//! Benchmarks for line classification and the protocol machine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slirc_bot::{HandshakeConfig, InboundMessage, ProtocolMachine};

const NICK: &str = "lunchbot";

/// Server keepalive
const PING: &str = "PING :irc.example.com\r";

/// Message posted to a channel
const CHANNEL_MESSAGE: &str = ":nick!user@host PRIVMSG #lunch :%time 15 pizza in the oven\r";

/// Message addressed to the bot
const PRIVATE_MESSAGE: &str = ":nick!user@host PRIVMSG lunchbot :%list\r";

/// Numeric reply the engine ignores
const NUMERIC_RESPONSE: &str =
    ":irc.server.net 001 lunchbot :Welcome to the IRC Network lunchbot!user@host\r";

fn benchmark_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("Classify");

    for (name, line) in [
        ("ping", PING),
        ("channel_message", CHANNEL_MESSAGE),
        ("private_message", PRIVATE_MESSAGE),
        ("numeric", NUMERIC_RESPONSE),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| black_box(InboundMessage::classify(black_box(line), NICK)))
        });
    }

    group.finish();
}

fn benchmark_machine(c: &mut Criterion) {
    let mut group = c.benchmark_group("Protocol Machine");

    for text_len in [16usize, 128, 400] {
        let line = format!(":nick!user@host PRIVMSG #lunch :{}\r", "x".repeat(text_len));
        group.bench_with_input(BenchmarkId::new("connected_feed", text_len), &line, |b, line| {
            let mut machine = ProtocolMachine::new(HandshakeConfig {
                nickname: NICK.to_string(),
                full_name: "Lunch Bot".to_string(),
                password: None,
            });
            for _ in 0..3 {
                let _ = machine.feed(NUMERIC_RESPONSE);
            }
            b.iter(|| black_box(machine.feed(black_box(line))))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_classify, benchmark_machine);
criterion_main!(benches);
