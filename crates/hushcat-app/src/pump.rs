//! One-directional I/O pumps.
//!
//! A pump is a spawned task that moves bytes between one source or sink and
//! one bounded queue. Each queue has exactly one producer and one consumer, so
//! order is preserved end to end.
//!
//! Read pumps report failures in-band: the error is the last item on the
//! queue, and the queue closes right after. A clean end-of-stream just closes
//! the queue. Write pumps have no inbound queue to report on, so their
//! failures go to a shared fault queue the runtime watches.

use std::io;

use bytes::{Bytes, BytesMut};
use hushcat_core::{SessionError, TransportError};
use hushcat_proto::{Frame, FrameDecoder};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, trace};

/// Item on an outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Write these bytes in full
    Data(Bytes),
    /// Flush, shut down the sink and stop, even if the queue stays open
    Drain,
}

/// Handle to a running pump. Dropping it aborts the task.
#[derive(Debug)]
pub struct PumpHandle {
    task: Option<JoinHandle<()>>,
}

impl PumpHandle {
    fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Wait for the pump to stop on its own.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Abort the pump and wait until its source or sink is dropped.
    pub async fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Spawn a pump turning each non-empty read from `source` into one queue item.
///
/// Reads are at most `chunk` bytes.
pub fn spawn_read_pump<R>(
    source: R,
    chunk: usize,
    queue: mpsc::Sender<Result<Bytes, SessionError>>,
    context: &'static str,
) -> PumpHandle
where
    R: AsyncRead + Unpin + Send + 'static,
{
    PumpHandle::new(tokio::spawn(read_pump(source, chunk, queue, context)))
}

async fn read_pump<R>(
    mut source: R,
    chunk: usize,
    queue: mpsc::Sender<Result<Bytes, SessionError>>,
    context: &'static str,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = BytesMut::with_capacity(chunk);
        match source.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("{context}: end of stream");
                return;
            },
            Ok(n) => {
                trace!("{context}: read {n} bytes");
                if queue.send(Ok(buf.freeze())).await.is_err() {
                    return;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => {
                let _ = queue.send(Err(TransportError::io(context, &e).into())).await;
                return;
            },
        }
    }
}

/// Spawn a pump decoding `source` into frames.
///
/// End-of-stream in the middle of a frame is reported as a framing error
/// before the queue closes.
pub fn spawn_frame_pump<R>(
    source: R,
    chunk: usize,
    max_frame_len: usize,
    queue: mpsc::Sender<Result<Frame, SessionError>>,
    context: &'static str,
) -> PumpHandle
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let decoder = FrameDecoder::with_max_frame_len(max_frame_len);
    PumpHandle::new(tokio::spawn(frame_pump(source, chunk, decoder, queue, context)))
}

async fn frame_pump<R>(
    mut source: R,
    chunk: usize,
    mut decoder: FrameDecoder,
    queue: mpsc::Sender<Result<Frame, SessionError>>,
    context: &'static str,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(chunk);
    loop {
        buf.clear();
        buf.reserve(chunk);

        match source.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("{context}: end of stream");
                if let Err(e) = decoder.finish() {
                    let _ = queue.send(Err(e.into())).await;
                }
                return;
            },
            Ok(_) => decoder.extend(&buf),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = queue.send(Err(TransportError::io(context, &e).into())).await;
                return;
            },
        }

        loop {
            let item = match decoder.next_frame() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => break,
                Err(e) => Err(SessionError::from(e)),
            };
            let failed = item.is_err();
            if queue.send(item).await.is_err() || failed {
                return;
            }
        }
    }
}

/// Spawn a pump writing queue items to `sink`.
///
/// Every item is flushed as soon as it is written. On [`Outgoing::Drain`] or
/// queue closure the sink is shut down. A write failure is sent to `faults`
/// before the queue is released, so a producer that sees the queue closed
/// finds the fault already waiting.
pub fn spawn_write_pump<W>(
    sink: W,
    queue: mpsc::Receiver<Outgoing>,
    faults: mpsc::Sender<SessionError>,
    context: &'static str,
) -> PumpHandle
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    PumpHandle::new(tokio::spawn(async move {
        let mut queue = queue;
        if let Err(e) = write_pump(sink, &mut queue, context).await {
            let _ = faults.send(TransportError::io(context, &e).into()).await;
        }
        drop(queue);
    }))
}

async fn write_pump<W>(
    mut sink: W,
    queue: &mut mpsc::Receiver<Outgoing>,
    context: &'static str,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = queue.recv().await {
        match item {
            Outgoing::Data(bytes) => {
                trace!("{context}: writing {} bytes", bytes.len());
                sink.write_all(&bytes).await?;
                sink.flush().await?;
            },
            Outgoing::Drain => {
                debug!("{context}: draining");
                break;
            },
        }
    }

    sink.flush().await?;
    sink.shutdown().await
}

#[cfg(test)]
mod tests {
    use hushcat_proto::FramingError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;

    #[tokio::test]
    async fn read_pump_forwards_chunks_then_closes() {
        let (mut near, far) = duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let _pump = spawn_read_pump(far, 16, tx, "test input");

        near.write_all(b"hello").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), Bytes::from_static(b"hello"));

        drop(near);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn read_pump_respects_chunk_size() {
        let (mut near, far) = duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let _pump = spawn_read_pump(far, 4, tx, "test input");

        near.write_all(b"0123456789").await.unwrap();
        drop(near);

        let mut collected = Vec::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= 4);
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"0123456789");
    }

    #[tokio::test]
    async fn frame_pump_reassembles_split_frames() {
        let (mut near, far) = duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let _pump = spawn_frame_pump(far, 3, 1024, tx, "test transport");

        near.write_all(b"one\ntw").await.unwrap();
        near.write_all(b"o\nthree\n").await.unwrap();
        drop(near);

        let mut lines = Vec::new();
        while let Some(frame) = rx.recv().await {
            lines.push(frame.unwrap().as_text().unwrap().to_string());
        }
        assert_eq!(lines, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn frame_pump_reports_truncation() {
        let (mut near, far) = duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let _pump = spawn_frame_pump(far, 64, 1024, tx, "test transport");

        near.write_all(b"whole\npartial").await.unwrap();
        drop(near);

        assert_eq!(rx.recv().await.unwrap().unwrap().as_text(), Some("whole"));
        assert_eq!(
            rx.recv().await.unwrap(),
            Err(SessionError::Framing(FramingError::Truncated { residual: 7 }))
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn frame_pump_stops_on_oversized_frame() {
        let (mut near, far) = duplex(64);
        let (tx, mut rx) = mpsc::channel(8);
        let _pump = spawn_frame_pump(far, 64, 8, tx, "test transport");

        near.write_all(b"far too long for the limit").await.unwrap();

        let err = rx.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Framing(FramingError::FrameTooLarge { .. })));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn write_pump_drains_and_shuts_down() {
        let (near, mut far) = duplex(64);
        let (tx, rx) = mpsc::channel(8);
        let (fault_tx, mut faults) = mpsc::channel(1);
        let pump = spawn_write_pump(near, rx, fault_tx, "test output");

        tx.send(Outgoing::Data(Bytes::from_static(b"a\n"))).await.unwrap();
        tx.send(Outgoing::Data(Bytes::from_static(b"b\n"))).await.unwrap();
        tx.send(Outgoing::Drain).await.unwrap();
        pump.join().await;

        let mut written = Vec::new();
        far.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, b"a\nb\n");
        assert!(faults.try_recv().is_err());

        // Queue is still open but nothing reads it any more
        assert!(tx.send(Outgoing::Data(Bytes::from_static(b"c\n"))).await.is_err());
    }

    #[tokio::test]
    async fn write_pump_reports_broken_sink() {
        let (near, far) = duplex(64);
        drop(far);

        let (tx, rx) = mpsc::channel(8);
        let (fault_tx, mut faults) = mpsc::channel(1);
        let _pump = spawn_write_pump(near, rx, fault_tx, "test output");

        tx.send(Outgoing::Data(Bytes::from_static(b"lost\n"))).await.unwrap();
        let fault = faults.recv().await.unwrap();
        assert!(matches!(
            fault,
            SessionError::Transport(TransportError::Io { context: "test output", .. })
        ));
    }

    #[tokio::test]
    async fn write_fault_is_queued_before_the_queue_closes() {
        let (near, far) = duplex(64);
        drop(far);

        let (tx, rx) = mpsc::channel(1);
        let (fault_tx, mut faults) = mpsc::channel(1);
        let _pump = spawn_write_pump(near, rx, fault_tx, "test output");

        // Keep sending until the pump lets go of the queue
        while tx.send(Outgoing::Data(Bytes::from_static(b"lost\n"))).await.is_ok() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            faults.try_recv(),
            Ok(SessionError::Transport(TransportError::Io { context: "test output", .. }))
        ));
    }
}
