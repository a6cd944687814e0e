//! hushcat binary.
//!
//! # Usage
//!
//! ```bash
//! # Create an identity
//! hushcat genkey
//!
//! # Wait for a known contact on the default port
//! hushcat listen
//!
//! # Talk to a stranger and remember them as bob
//! hushcat connect --remember bob example.org
//!
//! # Tunnel through ssh, handing the conversation to a script
//! hushcat proxy --expect alice --exec ./bot.sh ssh alice.example.org hushcat listen
//! ```
//!
//! Plaintext goes to stdout; logs and diagnostics go to stderr. The exit
//! status is 0 after a graceful end and 1 after any failure.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod args;
mod commands;
mod error;
mod signal;
mod transport;

use std::io::{self, Write};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();

    let code = match commands::run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(io::stderr(), "hushcat: {e}");
            1
        },
    };

    // Exit here rather than dropping the runtime, which would wait on a
    // blocked stdin read
    std::process::exit(code);
}
