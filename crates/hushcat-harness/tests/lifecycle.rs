//! Conversation endings: graceful, peer-initiated, interrupted and failed.

use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use hushcat_app::{Interrupt, LocalEndpoint, LocalStreams, Outcome, Runtime, RuntimeConfig};
use hushcat_core::{
    AuthMode, ContactBook, Fingerprint, ProtocolViolation, Session, SessionError, SessionState,
    TransportError, testing::TagEngine,
};
use hushcat_harness::{MemoryContactStore, Running, STEP_TIMEOUT, Scenario, ScriptedPeer};
use hushcat_proto::FramingError;
use tokio::io::{AsyncWrite, DuplexStream, duplex};

fn fp(hex: &str) -> Fingerprint {
    Fingerprint::from_hex(hex).unwrap()
}

/// A conversation with alice, already authorized.
async fn authorized() -> Running {
    let mut running = Scenario::new(fp("ee00")).contact("alice", fp("aa11")).start();

    let hello = running.peer.recv().await.unwrap().unwrap();
    assert_eq!(hello, TagEngine::hello(&fp("ee00")));
    running.peer.send(&TagEngine::hello(&fp("aa11"))).await.unwrap();
    assert_eq!(running.user.opened().await, Some(Some("alice".to_string())));

    running
}

#[tokio::test]
async fn local_end_waits_for_peer_to_close() {
    let mut running = authorized().await;

    running.user.type_text(b"hi alice\n").await.unwrap();
    let frame = running.peer.recv().await.unwrap().unwrap();
    assert_eq!(TagEngine::decode_msg(&frame), Some(b"hi alice\n".to_vec()));

    running.user.hang_up().await.unwrap();

    // Termination frame, then the runtime shuts down its side
    let rest = running.peer.recv_until_closed().await.unwrap();
    assert_eq!(rest, vec![TagEngine::end_frame()]);
    assert!(running.peer.saw_close());

    // Still waiting: the peer has not closed yet
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!running.is_finished());

    running.peer.close().await.unwrap();
    let finished = running.finished().await;
    assert_eq!(finished.result, Ok(Outcome::LocalEnded));
    assert_eq!(finished.state, SessionState::Terminated);
    assert!(finished.local_closed);
}

#[tokio::test]
async fn peer_end_returns_at_once_and_flushes_output() {
    let mut running = authorized().await;

    running.peer.send(&TagEngine::msg(b"one\n")).await.unwrap();
    running.peer.send(&TagEngine::msg(b"two\n")).await.unwrap();
    running.peer.send(&TagEngine::end_frame()).await.unwrap();

    let finished = running.finished().await;
    assert_eq!(finished.result, Ok(Outcome::PeerEnded));
    assert_eq!(finished.state, SessionState::Terminated);
    assert!(finished.local_closed);

    // Everything delivered before the end reached the user
    assert_eq!(running.user.read_all().await.unwrap(), b"one\ntwo\n");

    // No termination frame is sent back
    assert_eq!(running.peer.recv_until_closed().await.unwrap(), Vec::new());
}

#[tokio::test]
async fn interrupt_ends_gracefully() {
    let mut running = authorized().await;

    running.interrupt();
    let rest = running.peer.recv_until_closed().await.unwrap();
    assert_eq!(rest, vec![TagEngine::end_frame()]);

    running.peer.close().await.unwrap();
    assert_eq!(running.finished().await.result, Ok(Outcome::LocalEnded));
}

#[tokio::test]
async fn interrupt_before_authorization_sends_nothing_more() {
    let mut running = Scenario::new(fp("ee00")).start();
    assert_eq!(running.peer.recv().await.unwrap(), Some(TagEngine::hello(&fp("ee00"))));

    running.interrupt();
    assert_eq!(running.peer.recv_until_closed().await.unwrap(), Vec::new());

    running.peer.close().await.unwrap();
    let finished = running.finished().await;
    assert_eq!(finished.result, Ok(Outcome::LocalEnded));
    assert!(!running.user.was_opened());
}

#[tokio::test]
async fn binary_payload_ends_then_fails() {
    let mut running = authorized().await;

    running.user.type_text(b"bin\0ary").await.unwrap();

    // Nothing of the payload is sent; the conversation is ended cleanly
    let rest = running.peer.recv_until_closed().await.unwrap();
    assert_eq!(rest, vec![TagEngine::end_frame()]);

    running.peer.close().await.unwrap();
    let finished = running.finished().await;
    assert_eq!(finished.result, Err(SessionError::Protocol(ProtocolViolation::BinaryPayload)));
    assert_eq!(finished.state, SessionState::Aborted);
    assert!(finished.result.unwrap_err().to_string().contains("base64"));
}

#[tokio::test]
async fn connection_dropped_before_authorization() {
    let mut running = Scenario::new(fp("ee00")).start();
    running.peer.close().await.unwrap();

    let finished = running.finished().await;
    let err = finished.result.unwrap_err();
    assert_eq!(
        err,
        SessionError::Transport(TransportError::ConnectionDropped { authorized: false })
    );
    assert_eq!(err.to_string(), "connection dropped");
}

#[tokio::test]
async fn connection_dropped_after_authorization_warns_about_deniability() {
    let mut running = authorized().await;
    running.peer.close().await.unwrap();

    let finished = running.finished().await;
    let err = finished.result.unwrap_err();
    assert_eq!(err, SessionError::Transport(TransportError::ConnectionDropped { authorized: true }));
    assert!(err.to_string().contains("might not be deniable"));
    assert_eq!(finished.state, SessionState::Aborted);
}

#[tokio::test]
async fn truncated_stream_is_a_framing_error() {
    let mut running = Scenario::new(fp("ee00")).start();
    running.peer.send_raw(b"TAG? aa1").await.unwrap();
    running.peer.close().await.unwrap();

    let finished = running.finished().await;
    assert_eq!(
        finished.result,
        Err(SessionError::Framing(FramingError::Truncated { residual: 8 }))
    );
    assert_eq!(finished.state, SessionState::Aborted);
}

/// Sink whose reader went away.
struct BrokenPipe;

impl AsyncWrite for BrokenPipe {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Local side with silent input and broken output.
#[derive(Default)]
struct BrokenOutput {
    input: Option<DuplexStream>,
}

impl LocalEndpoint for BrokenOutput {
    fn open(&mut self, _peer_name: Option<&str>) -> Result<LocalStreams, SessionError> {
        let (reader, input) = duplex(64);
        self.input = Some(input);
        Ok(LocalStreams { reader: Box::new(reader), writer: Box::new(BrokenPipe) })
    }

    async fn close(&mut self) {}
}

#[tokio::test]
async fn failed_local_write_after_peer_end_is_fatal() {
    let mut contacts = ContactBook::new();
    contacts.insert("alice", fp("aa11")).unwrap();
    contacts.set_self(fp("ee00"));

    let session = Session::new(TagEngine::new(fp("ee00")), contacts, AuthMode::KnownOnly);
    let (mut peer, transport) = ScriptedPeer::new();
    let (_trigger, interrupt) = Interrupt::pair();
    let mut runtime = Runtime::new(
        session,
        MemoryContactStore::new(),
        BrokenOutput::default(),
        RuntimeConfig::default(),
    );

    // Authorize, deliver and end in one write
    let mut script = Vec::new();
    for frame in [
        TagEngine::hello(&fp("aa11")),
        TagEngine::msg(b"secret reply\n"),
        TagEngine::end_frame(),
    ] {
        script.extend_from_slice(&frame.to_wire());
    }
    peer.send_raw(&script).await.unwrap();

    let result =
        tokio::time::timeout(STEP_TIMEOUT, runtime.run(transport, interrupt)).await.unwrap();
    assert!(matches!(
        result,
        Err(SessionError::Transport(TransportError::Io { context: "local output", .. }))
    ));
    assert_eq!(runtime.session().state(), SessionState::Aborted);
}
