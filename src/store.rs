//! Session state store: process-wide observable snapshots
//!
//! The single piece of shared mutable state. Writers (session,
//! coordinator, tracker) replace slices atomically through
//! `send_modify`; the output layer holds a receiver and only reads.

use crate::coordinator::SignedTxnInfo;
use crate::scenarios::Scenario;
use crate::tracker::SubmissionOutcome;
use crate::transaction::Address;
use std::sync::Arc;
use tokio::sync::watch;

/// Connection status of the live signing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Pairing,
    Connected,
}

/// Read-only snapshot handed to the output layer.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub connection: ConnectionState,
    pub accounts: Vec<Address>,
    /// Primary address: first account of the live session
    pub address: Option<Address>,
    /// Pairing URI for out-of-band approval while `Pairing`
    pub pairing_uri: Option<String>,
    /// A signing request is awaiting the wallet
    pub pending_request: bool,
    /// Scenario waiting for a user-supplied numeric parameter
    pub parameter_prompt: Option<Scenario>,
    /// Validated result of the last signing operation, per group
    pub last_result: Option<Vec<Vec<Option<SignedTxnInfo>>>>,
    /// Per-group submission outcomes of the last submit
    pub submission_outcomes: Vec<SubmissionOutcome>,
}

/// Shared handle to the canonical [`AppState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<AppState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AppState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Apply one mutation atomically; readers observe either the old
    /// or the new snapshot, never a partial update.
    pub fn update(&self, f: impl FnOnce(&mut AppState)) {
        self.tx.send_modify(f);
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> AppState {
        self.tx.borrow().clone()
    }

    /// Read-only subscription for the output layer.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    /// Reset everything back to the disconnected initial state.
    pub fn reset(&self) {
        self.update(|state| *state = AppState::default());
    }
}
