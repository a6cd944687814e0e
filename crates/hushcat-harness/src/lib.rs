//! Test harness for hushcat conversations.
//!
//! Runs the real [`hushcat_app::Runtime`] against in-memory collaborators so
//! every scenario exercises the same event loop the binary uses.
//!
//! - [`ScriptedPeer`]: the far end of the transport, driven line by line
//! - [`DuplexEndpoint`] / [`LocalUser`]: the local plaintext endpoint and the
//!   test's handle on it
//! - [`MemoryContactStore`]: contact store that records every save
//! - [`Scenario`]: the three above wired to a runtime running the tag engine

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod endpoint;
pub mod peer;
pub mod scenario;
pub mod store;

pub use endpoint::{DuplexEndpoint, LocalUser};
pub use peer::ScriptedPeer;
pub use scenario::{Finished, Running, Scenario};
pub use store::MemoryContactStore;

use std::time::Duration;

/// Upper bound for any single wait in a scenario.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);
