//! Wire framing for hushcat.
//!
//! A hushcat transport is an unstructured byte stream (a TCP socket or the
//! pipes of a spawned process). This crate turns it into discrete protocol
//! messages and back:
//!
//! - [`Frame`]: one protocol message, guaranteed free of the delimiter byte
//! - [`FrameDecoder`]: incremental decoder that reassembles frames from
//!   arbitrarily fragmented input
//!
//! # Wire Format
//!
//! ```text
//! [payload bytes (no 0x0A)] 0x0A [payload bytes (no 0x0A)] 0x0A ...
//! ```
//!
//! The crate knows nothing about sessions or encryption. Payloads are produced
//! by the crypto engine, whose wire encoding is printable text and therefore
//! delimiter-safe.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
pub mod errors;
mod frame;

pub use codec::{DEFAULT_MAX_FRAME_LEN, FrameDecoder};
pub use errors::{FramingError, ProtocolError};
pub use frame::{DELIMITER, Frame};
