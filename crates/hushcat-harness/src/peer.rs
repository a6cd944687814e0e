//! Scripted remote peer.
//!
//! The peer owns the far end of an in-memory transport. Tests write frames to
//! it and read back whatever the runtime transmits, one frame at a time.

use std::io;

use hushcat_app::Transport;
use hushcat_proto::{Frame, FrameDecoder};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex},
    time::timeout,
};

use crate::STEP_TIMEOUT;

const BUFFER: usize = 64 * 1024;

/// Far end of a conversation's transport.
#[derive(Debug)]
pub struct ScriptedPeer {
    stream: DuplexStream,
    decoder: FrameDecoder,
    eof: bool,
}

impl ScriptedPeer {
    /// Peer and the transport to hand to the runtime.
    pub fn new() -> (Self, Transport) {
        let (runtime_side, peer_side) = duplex(BUFFER);
        let peer = Self { stream: peer_side, decoder: FrameDecoder::new(), eof: false };
        (peer, Transport::from_stream(runtime_side))
    }

    /// Send one frame.
    pub async fn send(&mut self, frame: &Frame) -> io::Result<()> {
        self.stream.write_all(&frame.to_wire()).await
    }

    /// Send bytes as they are, delimiter or not.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await
    }

    /// Next frame from the runtime.
    ///
    /// `Ok(None)` once the runtime has shut down its side and every frame was
    /// read, or when nothing arrives within [`STEP_TIMEOUT`].
    pub async fn recv(&mut self) -> io::Result<Option<Frame>> {
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {},
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
            if self.eof {
                return Ok(None);
            }

            let mut buf = [0u8; 4096];
            let Ok(read) = timeout(STEP_TIMEOUT, self.stream.read(&mut buf)).await else {
                return Ok(None);
            };
            match read? {
                0 => self.eof = true,
                n => self.decoder.extend(&buf[..n]),
            }
        }
    }

    /// Read every remaining frame until the runtime shuts down its side.
    pub async fn recv_until_closed(&mut self) -> io::Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv().await? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Whether the runtime has shut down its side.
    pub fn saw_close(&self) -> bool {
        self.eof
    }

    /// Close the transport from this side, as a peer exiting would.
    pub async fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
