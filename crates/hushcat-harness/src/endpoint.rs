//! In-memory local endpoint.

use hushcat_app::{LocalEndpoint, LocalStreams};
use hushcat_core::{SessionError, TransportError};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex},
    sync::oneshot,
    time::timeout,
};

use crate::STEP_TIMEOUT;

const BUFFER: usize = 64 * 1024;

/// Local endpoint backed by an in-memory pipe.
#[derive(Debug)]
pub struct DuplexEndpoint {
    stream: Option<DuplexStream>,
    opened: Option<oneshot::Sender<Option<String>>>,
    closed: bool,
}

/// The test's side of a [`DuplexEndpoint`]: the user at the keyboard.
#[derive(Debug)]
pub struct LocalUser {
    stream: DuplexStream,
    opened: Option<oneshot::Receiver<Option<String>>>,
    opened_as: Option<Option<String>>,
}

impl DuplexEndpoint {
    /// Endpoint and the user attached to it.
    pub fn new() -> (Self, LocalUser) {
        let (runtime_side, user_side) = duplex(BUFFER);
        let (opened_tx, opened_rx) = oneshot::channel();

        let endpoint = Self { stream: Some(runtime_side), opened: Some(opened_tx), closed: false };
        (endpoint, LocalUser { stream: user_side, opened: Some(opened_rx), opened_as: None })
    }

    /// Whether the runtime closed the endpoint after a graceful end.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl LocalEndpoint for DuplexEndpoint {
    fn open(&mut self, peer_name: Option<&str>) -> Result<LocalStreams, SessionError> {
        let stream = self.stream.take().ok_or(TransportError::LocalClosed)?;
        if let Some(opened) = self.opened.take() {
            let _ = opened.send(peer_name.map(str::to_string));
        }

        let (reader, writer) = tokio::io::split(stream);
        Ok(LocalStreams { reader: Box::new(reader), writer: Box::new(writer) })
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

impl LocalUser {
    /// Wait until the runtime opens the endpoint, returning the peer name it
    /// was opened for. `None` if it is not opened in time.
    pub async fn opened(&mut self) -> Option<Option<String>> {
        if self.opened_as.is_none() {
            let receiver = self.opened.as_mut()?;
            let name = timeout(STEP_TIMEOUT, receiver).await.ok()?.ok()?;
            self.opened = None;
            self.opened_as = Some(name);
        }
        self.opened_as.clone()
    }

    /// Whether the runtime has opened the endpoint yet.
    pub fn was_opened(&mut self) -> bool {
        if self.opened_as.is_some() {
            return true;
        }
        let Some(receiver) = self.opened.as_mut() else {
            return false;
        };
        match receiver.try_recv() {
            Ok(name) => {
                self.opened = None;
                self.opened_as = Some(name);
                true
            },
            Err(_) => false,
        }
    }

    /// Type a line of plaintext.
    pub async fn type_text(&mut self, text: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(text).await
    }

    /// Close the keyboard: the runtime sees end-of-stream on local input.
    pub async fn hang_up(&mut self) -> std::io::Result<()> {
        self.stream.shutdown().await
    }

    /// Read delivered plaintext until the runtime closes local output.
    pub async fn read_all(&mut self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.stream.read_to_end(&mut out).await?;
        Ok(out)
    }

    /// Read exactly `len` bytes of delivered plaintext.
    pub async fn read_exact(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        let mut out = vec![0; len];
        self.stream.read_exact(&mut out).await?;
        Ok(out)
    }
}
