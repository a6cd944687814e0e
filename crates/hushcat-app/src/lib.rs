//! Async runtime for hushcat.
//!
//! Drives the sans-IO [`hushcat_core::Session`] over real byte streams.
//!
//! # Components
//!
//! - [`pump`]: one-directional tasks between a source or sink and a queue
//! - [`LocalEndpoint`]: where plaintext comes from and goes to, either
//!   [`StdioEndpoint`] or a bridged process ([`ExecEndpoint`])
//! - [`Interrupt`]: single-fire cancellation fed by the binary's signal handler
//! - [`Runtime`]: the event loop executing session actions
//!
//! # Concurrency
//!
//! One coordinating loop plus at most four pumps: transport read and write,
//! then local read and write once the peer is authorized. Every queue is
//! bounded and has exactly one producer and one consumer.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bridge;
pub mod config;
pub mod interrupt;
pub mod local;
pub mod pump;
pub mod runtime;

pub use bridge::ExecEndpoint;
pub use config::RuntimeConfig;
pub use interrupt::{Interrupt, InterruptTrigger};
pub use local::{BoxedReader, BoxedWriter, LocalEndpoint, LocalStreams, StdioEndpoint};
pub use pump::{Outgoing, PumpHandle};
pub use runtime::{Outcome, Runtime, Transport};
