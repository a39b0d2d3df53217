//! Remote signer session: pairing lifecycle and request correlation
//!
//! One `SignerSession` represents one pairing with an external wallet.
//! Exactly one session is live at a time; building a new one replaces
//! the old pairing and abandons any request it had in flight. Events
//! from the wallet side are applied strictly one at a time, each state
//! update completing before the next event is taken.

use crate::channel::{SessionEvent, SignRequest, SignerChannel, WireTxn};
use crate::config::ClientConfig;
use crate::error::{Result, WalletError};
use crate::store::{ConnectionState, StateStore};
use crate::transaction::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Lifecycle state of the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Pairing,
    Connected,
}

struct SessionInner {
    state: SessionState,
    accounts: Vec<Address>,
}

/// One logical pairing with a remote wallet.
pub struct SignerSession<C: SignerChannel> {
    channel: C,
    store: StateStore,
    pairing_timeout: Duration,
    inner: Mutex<SessionInner>,
    in_flight: AtomicBool,
}

impl<C: SignerChannel> SignerSession<C> {
    pub fn new(channel: C, config: &ClientConfig, store: StateStore) -> Self {
        Self {
            channel,
            store,
            pairing_timeout: config.pairing_timeout,
            inner: Mutex::new(SessionInner {
                state: SessionState::Disconnected,
                accounts: Vec::new(),
            }),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().expect("session lock").state
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.inner.lock().expect("session lock").accounts.clone()
    }

    /// First account of the pairing.
    pub fn primary_address(&self) -> Option<Address> {
        self.inner
            .lock()
            .expect("session lock")
            .accounts
            .first()
            .copied()
    }

    /// Establish the pairing: resume a valid prior one, or run a new
    /// handshake and wait for out-of-band approval.
    pub async fn connect(&self) -> Result<Vec<Address>> {
        if let Some(accounts) = self.channel.resume().await? {
            tracing::info!("resumed existing pairing");
            self.apply_event(SessionEvent::Connected { accounts: accounts.clone() });
            return Ok(accounts);
        }

        {
            let mut inner = self.inner.lock().expect("session lock");
            inner.state = SessionState::Pairing;
        }
        self.store
            .update(|s| s.connection = ConnectionState::Pairing);

        let pairing = match self.channel.pair().await {
            Ok(pairing) => pairing,
            Err(e) => {
                self.mark_disconnected();
                return Err(WalletError::Pairing(e.to_string()));
            }
        };
        tracing::info!("pairing created, awaiting approval");
        self.store
            .update(|s| s.pairing_uri = Some(pairing.uri.clone()));

        // Approval (or rejection) arrives on the event queue
        let wait = async {
            loop {
                match self.channel.next_event().await {
                    Some(SessionEvent::Connected { accounts }) => {
                        self.apply_event(SessionEvent::Connected {
                            accounts: accounts.clone(),
                        });
                        return Ok(accounts);
                    }
                    Some(SessionEvent::Disconnected) | None => {
                        return Err(WalletError::Pairing(
                            "handshake rejected by wallet".to_string(),
                        ));
                    }
                    Some(event) => self.apply_event(event),
                }
            }
        };

        match tokio::time::timeout(self.pairing_timeout, wait).await {
            Ok(Ok(accounts)) => Ok(accounts),
            Ok(Err(e)) => {
                self.mark_disconnected();
                Err(e)
            }
            Err(_) => {
                self.mark_disconnected();
                Err(WalletError::Pairing("handshake timed out".to_string()))
            }
        }
    }

    /// Send one correlated signing request and suspend until the
    /// wallet's response. At most one request per session may be
    /// outstanding; a second concurrent call is a caller error.
    pub async fn sign_request(&self, txns: Vec<WireTxn>) -> Result<Vec<Option<String>>> {
        if self.state() != SessionState::Connected {
            return Err(WalletError::SessionClosed);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WalletError::RequestInFlight);
        }

        let result = self.channel.request(SignRequest::new(txns)).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    /// Terminate the pairing. Subsequent operations fail with
    /// [`WalletError::SessionClosed`] until `connect()` succeeds again.
    pub async fn kill(&self) -> Result<()> {
        let result = self.channel.disconnect().await;
        self.mark_disconnected();
        self.store.reset();
        result
    }

    /// Next queued event from the wallet side; `None` once the channel
    /// is gone. Callers drain this from a single task and feed each
    /// event through [`apply_event`](Self::apply_event).
    pub async fn next_event(&self) -> Option<SessionEvent> {
        self.channel.next_event().await
    }

    /// Apply one session event, completing the state update (session
    /// and store) before returning.
    pub fn apply_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { accounts } => {
                {
                    let mut inner = self.inner.lock().expect("session lock");
                    inner.state = SessionState::Connected;
                    inner.accounts = accounts.clone();
                }
                tracing::info!("session connected with {} accounts", accounts.len());
                self.store.update(|s| {
                    s.connection = ConnectionState::Connected;
                    s.address = accounts.first().copied();
                    s.accounts = accounts;
                    s.pairing_uri = None;
                });
            }
            SessionEvent::SessionUpdated { accounts } => {
                {
                    let mut inner = self.inner.lock().expect("session lock");
                    // Redundant updates with the same account list are no-ops
                    if inner.accounts == accounts {
                        return;
                    }
                    inner.accounts = accounts.clone();
                }
                tracing::info!("session updated: {} accounts", accounts.len());
                self.store.update(|s| {
                    s.address = accounts.first().copied();
                    s.accounts = accounts;
                });
            }
            SessionEvent::Disconnected => {
                tracing::info!("session disconnected by wallet");
                self.mark_disconnected();
                self.store.reset();
            }
        }
    }

    fn mark_disconnected(&self) {
        let mut inner = self.inner.lock().expect("session lock");
        inner.state = SessionState::Disconnected;
        inner.accounts.clear();
        self.in_flight.store(false, Ordering::SeqCst);
        self.store
            .update(|s| s.connection = ConnectionState::Disconnected);
    }
}
