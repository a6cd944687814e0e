//! Async conversation runtime
//!
//! Event loop that drives a [`Session`] over a transport. Pumps move bytes
//! between the transport, the local endpoint and bounded queues; the loop
//! waits on the remote-inbound queue, the local-inbound queue and the
//! interrupt with `tokio::select!` and executes the session's actions.
//!
//! The local endpoint is opened only when the session asks for it after
//! authorization, so until then the local-inbound branch never fires.

use bytes::Bytes;
use hushcat_core::{
    ContactStore, CryptoEngine, Session, SessionAction, SessionError, SessionState, TransportError,
};
use hushcat_proto::Frame;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tracing::{debug, info};

use crate::{
    config::RuntimeConfig,
    interrupt::Interrupt,
    local::{BoxedReader, BoxedWriter, LocalEndpoint},
    pump::{Outgoing, PumpHandle, spawn_frame_pump, spawn_read_pump, spawn_write_pump},
};

/// How a conversation ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The peer ended the conversation
    PeerEnded,
    /// This side ended it and the peer then closed the transport
    LocalEnded,
}

/// The byte stream to the peer, split into its two halves.
pub struct Transport {
    reader: BoxedReader,
    writer: BoxedWriter,
}

impl Transport {
    /// Transport from separate halves, such as a process's stdout and stdin.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self { reader: Box::new(reader), writer: Box::new(writer) }
    }

    /// Transport over one bidirectional stream, such as a TCP connection.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

enum Event {
    Fault(SessionError),
    Interrupt,
    Remote(Option<Result<Frame, SessionError>>),
    Local(Option<Result<Bytes, SessionError>>),
}

enum Flow {
    Continue,
    Finished,
}

struct LocalLinks {
    outbound: mpsc::Sender<Outgoing>,
    inbound: mpsc::Receiver<Result<Bytes, SessionError>>,
    writer: PumpHandle,
    reader: PumpHandle,
}

/// Queues and pumps of one running conversation.
struct Links {
    remote_out: mpsc::Sender<Outgoing>,
    remote_in: mpsc::Receiver<Result<Frame, SessionError>>,
    remote_writer: PumpHandle,
    _remote_reader: PumpHandle,
    local: Option<LocalLinks>,
    faults: mpsc::Receiver<SessionError>,
    fault_tx: mpsc::Sender<SessionError>,
}

impl Links {
    fn spawn(transport: Transport, config: &RuntimeConfig) -> Self {
        let (fault_tx, faults) = mpsc::channel(4);
        let (remote_out, out_rx) = mpsc::channel(config.queue_capacity);
        let (in_tx, remote_in) = mpsc::channel(config.queue_capacity);

        let remote_writer =
            spawn_write_pump(transport.writer, out_rx, fault_tx.clone(), "transport write");
        let remote_reader = spawn_frame_pump(
            transport.reader,
            config.read_chunk,
            config.max_frame_len,
            in_tx,
            "transport read",
        );

        Self {
            remote_out,
            remote_in,
            remote_writer,
            _remote_reader: remote_reader,
            local: None,
            faults,
            fault_tx,
        }
    }

    async fn transmit(&mut self, item: Outgoing) -> Result<(), SessionError> {
        if self.remote_out.send(item).await.is_ok() {
            return Ok(());
        }

        // The writer only stops early after reporting a fault
        Err(self.faults.try_recv().unwrap_or_else(|_| {
            TransportError::Io { context: "transport write", message: "writer stopped".to_string() }
                .into()
        }))
    }

    async fn deliver(&mut self, plaintext: Bytes) -> Result<(), SessionError> {
        let Some(local) = &self.local else {
            return Err(TransportError::LocalClosed.into());
        };

        if local.outbound.send(Outgoing::Data(plaintext)).await.is_ok() {
            return Ok(());
        }
        Err(self.faults.try_recv().unwrap_or(SessionError::Transport(TransportError::LocalClosed)))
    }

    fn open_local<L: LocalEndpoint>(
        &mut self,
        endpoint: &mut L,
        peer_name: Option<&str>,
        config: &RuntimeConfig,
    ) -> Result<(), SessionError> {
        if self.local.is_some() {
            return Ok(());
        }

        let streams = endpoint.open(peer_name)?;
        let (outbound, out_rx) = mpsc::channel(config.queue_capacity);
        let (in_tx, inbound) = mpsc::channel(config.queue_capacity);

        let writer = spawn_write_pump(streams.writer, out_rx, self.fault_tx.clone(), "local output");
        let reader = spawn_read_pump(streams.reader, config.read_chunk, in_tx, "local input");

        debug!("local endpoint opened");
        self.local = Some(LocalLinks { outbound, inbound, writer, reader });
        Ok(())
    }
}

async fn recv_local(local: &mut Option<LocalLinks>) -> Option<Result<Bytes, SessionError>> {
    match local {
        Some(local) => local.inbound.recv().await,
        None => std::future::pending().await,
    }
}

/// Drives one conversation to completion.
pub struct Runtime<E, S, L> {
    session: Session<E>,
    store: S,
    local: L,
    config: RuntimeConfig,
}

impl<E, S, L> Runtime<E, S, L>
where
    E: CryptoEngine,
    S: ContactStore,
    L: LocalEndpoint,
{
    /// Create a runtime for a session in Init.
    pub fn new(session: Session<E>, store: S, local: L, config: RuntimeConfig) -> Self {
        Self { session, store, local, config }
    }

    /// The session, for inspection after [`Runtime::run`].
    #[must_use]
    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// The contact store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The local endpoint.
    #[must_use]
    pub fn local(&self) -> &L {
        &self.local
    }

    /// Run the conversation until it ends.
    ///
    /// On a graceful end every plaintext already delivered is flushed to the
    /// local endpoint and the endpoint is closed before this returns.
    ///
    /// # Errors
    ///
    /// Any [`SessionError`]; the session is then Aborted.
    pub async fn run(
        &mut self,
        transport: Transport,
        mut interrupt: Interrupt,
    ) -> Result<Outcome, SessionError> {
        let mut links = Links::spawn(transport, &self.config);

        match self.drive(&mut links, &mut interrupt).await {
            Ok(outcome) => match self.close(links).await {
                Ok(()) => {
                    debug!(?outcome, "conversation over");
                    Ok(outcome)
                },
                Err(e) => {
                    self.session.abort();
                    debug!("flushing the conversation failed: {e}");
                    Err(e)
                },
            },
            Err(e) => {
                if !self.session.is_finished() {
                    self.session.abort();
                }
                debug!("conversation aborted: {e}");
                Err(e)
            },
        }
    }

    async fn drive(
        &mut self,
        links: &mut Links,
        interrupt: &mut Interrupt,
    ) -> Result<Outcome, SessionError> {
        let actions = self.session.start()?;
        self.execute(links, actions).await?;

        loop {
            let ending = self.session.state() == SessionState::Ending;

            let event = tokio::select! {
                biased;

                Some(fault) = links.faults.recv() => Event::Fault(fault),

                () = interrupt.fired(), if !ending => Event::Interrupt,

                frame = links.remote_in.recv() => Event::Remote(frame),

                chunk = recv_local(&mut links.local), if !ending => Event::Local(chunk),
            };

            let actions = match event {
                Event::Fault(e) | Event::Remote(Some(Err(e))) | Event::Local(Some(Err(e))) => {
                    return Err(e);
                },
                Event::Interrupt => {
                    info!("interrupted; ending the conversation");
                    self.session.begin_ending()?
                },
                Event::Remote(Some(Ok(frame))) => self.session.handle_frame(&frame)?,
                Event::Remote(None) => {
                    self.session.handle_remote_closed()?;
                    return Ok(Outcome::LocalEnded);
                },
                Event::Local(Some(Ok(chunk))) => self.session.handle_plaintext(&chunk)?,
                Event::Local(None) => {
                    debug!("local input closed");
                    self.session.begin_ending()?
                },
            };

            if let Flow::Finished = self.execute(links, actions).await? {
                return Ok(Outcome::PeerEnded);
            }
        }
    }

    async fn execute(
        &mut self,
        links: &mut Links,
        actions: Vec<SessionAction>,
    ) -> Result<Flow, SessionError> {
        let mut flow = Flow::Continue;

        for action in actions {
            match action {
                SessionAction::Transmit(frame) => {
                    links.transmit(Outgoing::Data(frame.to_wire())).await?;
                },
                SessionAction::Deliver(plaintext) => links.deliver(plaintext).await?,
                SessionAction::OpenLocal { peer_name } => {
                    links.open_local(&mut self.local, peer_name.as_deref(), &self.config)?;
                },
                SessionAction::PersistContacts => self.store.save(self.session.contacts())?,
                SessionAction::Drain => links.transmit(Outgoing::Drain).await?,
                SessionAction::Finish => flow = Flow::Finished,
            }
        }

        Ok(flow)
    }

    /// Flush and release the local endpoint, then the transport.
    ///
    /// A write failure during the flush fails the conversation: plaintext the
    /// session delivered did not reach its destination.
    async fn close(&mut self, links: Links) -> Result<(), SessionError> {
        let Links { remote_out, remote_writer, local, mut faults, .. } = links;

        if let Some(LocalLinks { outbound, writer, reader, .. }) = local {
            drop(outbound);
            writer.join().await;
            reader.cancel().await;
        }
        self.local.close().await;

        drop(remote_out);
        remote_writer.join().await;

        match faults.try_recv() {
            Ok(fault) => Err(fault),
            Err(_) => Ok(()),
        }
    }
}
