//! Local plaintext endpoints.
//!
//! The runtime opens the local endpoint only once the peer is authorized, so
//! nothing is read from it, and nothing written to it, before then.

use std::future::Future;

use hushcat_core::SessionError;
use tokio::io::{AsyncRead, AsyncWrite};

/// Boxed byte source.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed byte sink.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Both directions of an opened local endpoint.
pub struct LocalStreams {
    /// Plaintext to send to the peer
    pub reader: BoxedReader,
    /// Plaintext received from the peer
    pub writer: BoxedWriter,
}

/// Where plaintext comes from and goes to.
pub trait LocalEndpoint: Send {
    /// Open the endpoint for a peer authorized as `peer_name`.
    ///
    /// Called at most once per conversation.
    fn open(&mut self, peer_name: Option<&str>) -> Result<LocalStreams, SessionError>;

    /// Release anything left after both streams were dropped.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Standard input and output of this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioEndpoint;

impl LocalEndpoint for StdioEndpoint {
    fn open(&mut self, _peer_name: Option<&str>) -> Result<LocalStreams, SessionError> {
        Ok(LocalStreams {
            reader: Box::new(tokio::io::stdin()),
            writer: Box::new(tokio::io::stdout()),
        })
    }

    async fn close(&mut self) {}
}
