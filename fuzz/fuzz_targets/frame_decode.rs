//! Fuzz target for the incremental frame decoder
//!
//! # Strategy
//!
//! - Arbitrary stream bytes, fed in arbitrary chunk sizes
//! - Small frame limit so oversized frames are reached quickly
//!
//! # Invariants
//!
//! - NEVER panic
//! - Chunked decoding yields exactly what whole-buffer decoding yields
//! - No yielded frame contains the delimiter
//! - Without a limit error, the frames plus delimiters plus the residual
//!   account for every input byte

#![no_main]

use arbitrary::Arbitrary;
use hushcat_proto::{DELIMITER, FrameDecoder, FramingError};
use libfuzzer_sys::fuzz_target;

const MAX_FRAME_LEN: usize = 256;

#[derive(Debug, Arbitrary)]
struct Input {
    stream: Vec<u8>,
    chunks: Vec<u8>,
}

fn decode(stream: &[u8], chunks: &[u8]) -> (Vec<Vec<u8>>, Result<(), FramingError>) {
    let mut decoder = FrameDecoder::with_max_frame_len(MAX_FRAME_LEN);
    let mut frames = Vec::new();
    let mut rest = stream;
    let mut sizes = chunks.iter().cycle();

    while !rest.is_empty() {
        let size = sizes.next().map_or(rest.len(), |&n| usize::from(n).max(1)).min(rest.len());
        let (chunk, tail) = rest.split_at(size);
        rest = tail;

        decoder.extend(chunk);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => frames.push(frame.payload().to_vec()),
                Ok(None) => break,
                Err(e) => return (frames, Err(e)),
            }
        }
    }

    (frames, decoder.finish())
}

fuzz_target!(|input: Input| {
    let (whole, whole_end) = decode(&input.stream, &[]);
    let (chunked, chunked_end) = decode(&input.stream, &input.chunks);

    for frame in &chunked {
        assert!(!frame.contains(&DELIMITER));
    }

    // A limit error may fire at a different point depending on chunking
    if matches!(whole_end, Err(FramingError::FrameTooLarge { .. }))
        || matches!(chunked_end, Err(FramingError::FrameTooLarge { .. }))
    {
        return;
    }

    assert_eq!(whole, chunked);
    assert_eq!(whole_end, chunked_end);

    let residual = match whole_end {
        Ok(()) => 0,
        Err(FramingError::Truncated { residual }) => residual,
        Err(FramingError::FrameTooLarge { .. }) => unreachable!(),
    };
    let consumed: usize = whole.iter().map(|frame| frame.len() + 1).sum();
    assert_eq!(consumed + residual, input.stream.len());
});
