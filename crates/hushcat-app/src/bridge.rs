//! Bridging the conversation to a spawned process.
//!
//! With `--exec`, the plaintext goes to and comes from a command run as
//! `/bin/sh -c COMMAND -- NAME`, where NAME is the contact name the peer was
//! authorized as (empty for an unknown peer). The command runs in its own
//! process group so an interrupt aimed at hushcat does not reach it.

use std::process::Stdio;

use hushcat_core::{SessionError, TransportError};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::local::{LocalEndpoint, LocalStreams};

const SHELL: &str = "/bin/sh";

/// Local endpoint backed by a shell command.
#[derive(Debug)]
pub struct ExecEndpoint {
    command: String,
    child: Option<Child>,
}

impl ExecEndpoint {
    /// Endpoint that will run `command` once the peer is authorized.
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), child: None }
    }

    /// Command line passed to the shell.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn(&self, peer_name: &str) -> Result<Child, SessionError> {
        let mut command = Command::new(SHELL);
        command
            .arg("-c")
            .arg(&self.command)
            .arg("--")
            .arg(peer_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        #[cfg(unix)]
        command.process_group(0);

        command.spawn().map_err(|e| TransportError::io("spawning the exec command", &e).into())
    }
}

fn missing_pipe(which: &str) -> SessionError {
    TransportError::Io { context: "spawning the exec command", message: format!("no {which} pipe") }
        .into()
}

impl LocalEndpoint for ExecEndpoint {
    fn open(&mut self, peer_name: Option<&str>) -> Result<LocalStreams, SessionError> {
        let mut child = self.spawn(peer_name.unwrap_or_default())?;
        info!(pid = ?child.id(), "started '{}'", self.command);

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        self.child = Some(child);

        Ok(LocalStreams { reader: Box::new(stdout), writer: Box::new(stdin) })
    }

    /// Wait for the command to exit. Its pipes must already be dropped.
    ///
    /// A failing command is reported but does not fail the conversation,
    /// which is already over by now.
    async fn close(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.wait().await {
            Ok(status) if status.success() => debug!("'{}' exited", self.command),
            Ok(status) => warn!("'{}' exited with {status}", self.command),
            Err(e) => warn!("waiting for '{}': {e}", self.command),
        }
    }
}
