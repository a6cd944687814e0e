//! Authorization policy, end to end through the runtime.
//!
//! Contacts are `{alice: aa11}` throughout; the peer is either alice or the
//! stranger `bb22`.

use hushcat_app::Outcome;
use hushcat_core::{
    AuthFlags, AuthMode, ConfigConflict, ContactBook, Fingerprint, Rejection, SessionError,
    SessionState, testing::TagEngine,
};
use hushcat_harness::{Running, Scenario};

fn fp(hex: &str) -> Fingerprint {
    Fingerprint::from_hex(hex).unwrap()
}

fn start(mode: AuthMode) -> Running {
    Scenario::new(fp("ee00")).contact("alice", fp("aa11")).mode(mode).start()
}

/// Complete the handshake as `peer`.
async fn introduce(running: &mut Running, peer: &str) {
    let hello = running.peer.recv().await.unwrap().unwrap();
    assert_eq!(hello, TagEngine::hello(&fp("ee00")));
    running.peer.send(&TagEngine::hello(&fp(peer))).await.unwrap();
}

/// Let the peer end the conversation and collect the result.
async fn peer_ends(running: &mut Running) -> hushcat_harness::Finished {
    running.peer.send(&TagEngine::end_frame()).await.unwrap();
    let finished = running.finished().await;
    assert_eq!(finished.result, Ok(Outcome::PeerEnded));
    finished
}

#[tokio::test]
async fn default_allows_known_contact() {
    let mut running = start(AuthMode::KnownOnly);
    introduce(&mut running, "aa11").await;

    assert_eq!(running.user.opened().await, Some(Some("alice".to_string())));

    let finished = peer_ends(&mut running).await;
    assert_eq!(finished.contacts.fingerprint_of("alice"), Some(&fp("aa11")));
    assert_eq!(running.store.save_count(), 0);
}

#[tokio::test]
async fn default_rejects_stranger() {
    let mut running = start(AuthMode::KnownOnly);
    introduce(&mut running, "bb22").await;

    let finished = running.finished().await;
    assert_eq!(finished.result, Err(SessionError::Rejected(Rejection::UnknownContact)));
    assert_eq!(finished.state, SessionState::Aborted);
    assert!(!running.user.was_opened());
}

#[tokio::test]
async fn anyone_allows_stranger_without_remembering() {
    let mut running = start(AuthMode::Anyone);
    introduce(&mut running, "bb22").await;

    assert_eq!(running.user.opened().await, Some(None));

    let finished = peer_ends(&mut running).await;
    assert_eq!(finished.contacts.name_of(&fp("bb22")), None);
    assert_eq!(running.store.save_count(), 0);
}

#[tokio::test]
async fn anyone_names_known_contact() {
    let mut running = start(AuthMode::Anyone);
    introduce(&mut running, "aa11").await;

    assert_eq!(running.user.opened().await, Some(Some("alice".to_string())));
    peer_ends(&mut running).await;
}

#[tokio::test]
async fn remember_persists_stranger_exactly_once() {
    let mut running = start(AuthMode::Remember("bob".to_string()));
    introduce(&mut running, "bb22").await;

    assert_eq!(running.user.opened().await, Some(Some("bob".to_string())));

    // More traffic after authorization never saves again
    running.peer.send(&TagEngine::msg(b"hi\n")).await.unwrap();
    assert_eq!(running.user.read_exact(3).await.unwrap(), b"hi\n");

    let finished = peer_ends(&mut running).await;
    assert_eq!(finished.contacts.name_of(&fp("bb22")), Some("bob"));
    assert_eq!(running.store.save_count(), 1);

    let saved = running.store.last_saved().unwrap();
    assert_eq!(saved.fingerprint_of("bob"), Some(&fp("bb22")));
    assert_eq!(saved.fingerprint_of("alice"), Some(&fp("aa11")));
}

#[tokio::test]
async fn remember_of_known_contact_keeps_old_name() {
    let mut running = start(AuthMode::Remember("bob".to_string()));
    introduce(&mut running, "aa11").await;

    assert_eq!(running.user.opened().await, Some(Some("alice".to_string())));

    let finished = peer_ends(&mut running).await;
    assert!(!finished.contacts.contains_name("bob"));
    assert_eq!(running.store.save_count(), 0);
}

#[tokio::test]
async fn expect_rejects_stranger() {
    let mut running = start(AuthMode::Expect("alice".to_string()));
    introduce(&mut running, "bb22").await;

    let finished = running.finished().await;
    assert_eq!(
        finished.result,
        Err(SessionError::Rejected(Rejection::ExpectedUnknown { expected: "alice".to_string() }))
    );
    assert!(!running.user.was_opened());
}

#[tokio::test]
async fn expect_rejects_other_contact() {
    let mut running = Scenario::new(fp("ee00"))
        .contact("alice", fp("aa11"))
        .contact("carol", fp("cc33"))
        .mode(AuthMode::Expect("alice".to_string()))
        .start();
    introduce(&mut running, "cc33").await;

    let finished = running.finished().await;
    assert_eq!(
        finished.result,
        Err(SessionError::Rejected(Rejection::ExpectedOther {
            expected: "alice".to_string(),
            actual: "carol".to_string(),
        }))
    );
}

#[tokio::test]
async fn expect_allows_named_contact() {
    let mut running = start(AuthMode::Expect("alice".to_string()));
    introduce(&mut running, "aa11").await;

    assert_eq!(running.user.opened().await, Some(Some("alice".to_string())));
    peer_ends(&mut running).await;
}

#[test]
fn conflicting_flags_fail_before_any_connection() {
    let mut book = ContactBook::new();
    book.insert("alice", fp("aa11")).unwrap();

    let flags = AuthFlags {
        anyone: false,
        expect: Some("alice".to_string()),
        remember: Some("x".to_string()),
    };
    assert_eq!(AuthMode::resolve(&flags, &book), Err(ConfigConflict::ExpectWithRemember));
}
