//! Fuzz target for engine line parsing
//!
//! # Invariants
//!
//! - NEVER panic on any delimiter-free line
//! - Lines without the engine prefix are passed through untouched
//! - Every parsed message re-encodes to a line that parses back to it

#![no_main]

use hushcat_crypto::{Inbound, WireMessage, wire::TAG_PREFIX};
use hushcat_proto::Frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::new(data.to_vec()) else {
        return;
    };

    match WireMessage::parse(&frame) {
        Ok(Inbound::Text(text)) => {
            assert!(!text.starts_with(TAG_PREFIX.as_bytes()));
            assert_eq!(text, data);
        },
        Ok(Inbound::Message(message)) => {
            let encoded = message.to_frame().unwrap();
            match WireMessage::parse(&encoded) {
                Ok(Inbound::Message(again)) => assert_eq!(again, message),
                other => panic!("re-encoded message did not parse back: {other:?}"),
            }
        },
        Err(_) => {},
    }
});
