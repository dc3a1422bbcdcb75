//! Fuzz target for inbound line classification
//!
//! Feeds arbitrary input through the classifier and a protocol machine and
//! checks that neither panics.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_bot::{HandshakeConfig, InboundMessage, LineCodec, ProtocolMachine};

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    if input.len() > 8191 {
        return;
    }

    let _ = InboundMessage::classify(&input, "lunchbot");
    let _ = LineCodec::sanitize(&input);

    let mut machine = ProtocolMachine::new(HandshakeConfig {
        nickname: "lunchbot".to_string(),
        full_name: "Lunch Bot".to_string(),
        password: Some("pw".to_string()),
    });
    for line in input.split('\n') {
        let _ = machine.feed(line);
    }
});
