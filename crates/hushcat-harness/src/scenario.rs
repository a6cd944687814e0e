//! One conversation under test.
//!
//! A [`Scenario`] runs the real runtime with the tag engine, a
//! [`ScriptedPeer`] on the transport, a [`LocalUser`] on the local endpoint
//! and a [`MemoryContactStore`].
//!
//! ```ignore
//! let mut running = Scenario::new(me).contact("alice", alice).start();
//! running.peer.send(&TagEngine::hello(&alice)).await?;
//! assert_eq!(running.user.opened().await, Some(Some("alice".into())));
//! ```

use hushcat_app::{Interrupt, InterruptTrigger, Outcome, Runtime, RuntimeConfig};
use hushcat_core::{
    AuthMode, ContactBook, Fingerprint, Session, SessionError, SessionState, testing::TagEngine,
};
use tokio::{task::JoinHandle, time::timeout};

use crate::{DuplexEndpoint, LocalUser, MemoryContactStore, STEP_TIMEOUT, ScriptedPeer};

/// Conversation setup.
#[derive(Debug, Clone)]
pub struct Scenario {
    me: Fingerprint,
    contacts: ContactBook,
    mode: AuthMode,
    config: RuntimeConfig,
}

/// A started conversation.
pub struct Running {
    /// Remote side
    pub peer: ScriptedPeer,
    /// Local side
    pub user: LocalUser,
    /// Store the runtime saves contacts to
    pub store: MemoryContactStore,
    trigger: Option<InterruptTrigger>,
    task: Option<JoinHandle<Finished>>,
}

/// What a conversation left behind.
#[derive(Debug)]
pub struct Finished {
    /// Value returned by the runtime
    pub result: Result<Outcome, SessionError>,
    /// Final session state
    pub state: SessionState,
    /// Final contact book
    pub contacts: ContactBook,
    /// Whether the local endpoint was closed
    pub local_closed: bool,
}

impl Scenario {
    /// Scenario for a local identity `me`, no contacts, default policy.
    pub fn new(me: Fingerprint) -> Self {
        Self { me, contacts: ContactBook::new(), mode: AuthMode::KnownOnly, config: RuntimeConfig::default() }
    }

    /// Add a known contact.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn contact(mut self, name: &str, fingerprint: Fingerprint) -> Self {
        self.contacts.insert(name, fingerprint).expect("scenario contacts are consistent");
        self
    }

    /// Authorization policy, resolved the way the binary resolves flags.
    #[must_use]
    pub fn mode(mut self, mode: AuthMode) -> Self {
        self.mode = mode;
        self
    }

    /// Runtime tunables.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawn the runtime.
    pub fn start(self) -> Running {
        let mut contacts = self.contacts;
        contacts.set_self(self.me.clone());

        let session = Session::new(TagEngine::new(self.me), contacts, self.mode);
        let (endpoint, user) = DuplexEndpoint::new();
        let (peer, transport) = ScriptedPeer::new();
        let store = MemoryContactStore::new();
        let (trigger, interrupt) = Interrupt::pair();

        let mut runtime = Runtime::new(session, store.clone(), endpoint, self.config);
        let task = tokio::spawn(async move {
            let result = runtime.run(transport, interrupt).await;
            Finished {
                result,
                state: runtime.session().state(),
                contacts: runtime.session().contacts().clone(),
                local_closed: runtime.local().is_closed(),
            }
        });

        Running { peer, user, store, trigger: Some(trigger), task: Some(task) }
    }
}

impl Running {
    /// Fire the interrupt, as Ctrl-C would.
    pub fn interrupt(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            trigger.fire();
        }
    }

    /// Whether the runtime has returned.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the runtime to return.
    ///
    /// # Panics
    ///
    /// Panics if the runtime does not return within [`STEP_TIMEOUT`], if it
    /// panicked, or if called twice.
    #[allow(clippy::expect_used)]
    pub async fn finished(&mut self) -> Finished {
        let task = self.task.take().expect("finished called twice");
        timeout(STEP_TIMEOUT, task)
            .await
            .expect("runtime did not return in time")
            .expect("runtime panicked")
    }
}
