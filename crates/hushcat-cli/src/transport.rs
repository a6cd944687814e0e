//! Establishing the byte stream to the peer.
//!
//! - `connect`: dial a TCP address
//! - `listen`: accept exactly one TCP connection on a local port
//! - `proxy`: use a spawned command's stdin and stdout

use std::process::Stdio;

use hushcat_app::Transport;
use tokio::{
    net::{TcpListener, TcpStream},
    process::{Child, Command},
};
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Port used when an address does not name one.
pub const DEFAULT_PORT: &str = ":2147";

const DEFAULT_HOST: &str = "localhost";
const ANY_HOST: &str = "0.0.0.0";

/// Normalize a `[host][:port]` argument for dialing.
pub fn connect_address(arg: Option<&str>) -> String {
    let address = arg.unwrap_or(DEFAULT_PORT);
    let address =
        if address.contains(':') { address.to_string() } else { format!("{address}{DEFAULT_PORT}") };

    if address.starts_with(':') { format!("{DEFAULT_HOST}{address}") } else { address }
}

/// Normalize a `[:port]` argument for listening. A host is refused.
pub fn listen_address(arg: Option<&str>) -> Result<String, CliError> {
    let address = arg.unwrap_or(DEFAULT_PORT);
    if !address.starts_with(':') {
        return Err(CliError::RemoteListen(address.to_string()));
    }
    Ok(format!("{ANY_HOST}{address}"))
}

/// Dial `address`.
pub async fn connect(address: &str) -> Result<Transport, CliError> {
    let stream = TcpStream::connect(address).await.map_err(|source| CliError::Network {
        context: "connecting to",
        address: address.to_string(),
        source,
    })?;

    info!("connected to {address}");
    Ok(Transport::from_stream(stream))
}

/// Accept one connection on `address`, then stop listening.
pub async fn listen(address: &str) -> Result<Transport, CliError> {
    let network = |context, source| CliError::Network { context, address: address.to_string(), source };

    let listener = TcpListener::bind(address).await.map_err(|e| network("listening on", e))?;
    info!("listening on {address}");

    let (stream, peer) = listener.accept().await.map_err(|e| network("accepting on", e))?;
    info!("accepted a connection from {peer}");

    Ok(Transport::from_stream(stream))
}

/// A command whose stdin and stdout carry the conversation.
#[derive(Debug)]
pub struct ProxyCommand {
    program: String,
    child: Child,
}

impl ProxyCommand {
    /// Start `argv`. Its stderr is inherited.
    pub fn spawn(argv: &[String]) -> Result<(Self, Transport), CliError> {
        let (program, args) = argv.split_first().ok_or(CliError::MissingProxyCommand)?;
        let failed = |source: std::io::Error| CliError::Proxy { command: program.clone(), source };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(failed)?;

        let missing = |which: &str| {
            failed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, format!("no {which} pipe")))
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        debug!(pid = ?child.id(), "started proxy '{program}'");

        Ok((Self { program: program.clone(), child }, Transport::new(stdout, stdin)))
    }

    /// Release the command once the conversation is over.
    ///
    /// Its pipes are already closed along with the transport. The command is
    /// not killed; a command that ignores end-of-input keeps running.
    pub fn close(mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) if status.success() => debug!("proxy '{}' exited", self.program),
            Ok(Some(status)) => warn!("proxy '{}' exited with {status}", self.program),
            Ok(None) => debug!("proxy '{}' still running", self.program),
            Err(e) => warn!("proxy '{}': {e}", self.program),
        }
    }
}
