//! In-process wallet simulator
//!
//! Second implementation of [`SignerChannel`](super::SignerChannel)
//! used for offline demos and tests. It holds a fixed set of demo
//! identities, signs whatever the descriptors ask for, and can inject
//! protocol faults so the coordinator's validation paths can be
//! exercised without a remote wallet.

use super::{Pairing, SessionEvent, SignRequest, SignerChannel, WireTxn};
use crate::error::{Result, WalletError};
use crate::transaction::{Address, SignedTransaction, Transaction};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A fixed local identity: ed25519 key plus the derived address.
pub struct DemoIdentity {
    pub name: &'static str,
    pub signing_key: SigningKey,
    pub address: Address,
}

impl DemoIdentity {
    fn from_seed(name: &'static str, seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let address = Address(signing_key.verifying_key().to_bytes());
        Self {
            name,
            signing_key,
            address,
        }
    }

    /// Sign one unsigned transaction with this identity.
    pub fn sign(&self, txn: &Transaction) -> Result<SignedTransaction> {
        let encoded = txn.encode_unsigned()?;
        let sig = self.signing_key.sign(&encoded).to_bytes().to_vec();
        let auth_addr = (txn.sender != self.address).then_some(self.address);
        Ok(SignedTransaction {
            txn: txn.clone(),
            sig,
            auth_addr,
        })
    }
}

/// The fixed demo identities known to the simulator and to the
/// coordinator's local-substitution path.
pub fn demo_identities() -> Vec<DemoIdentity> {
    vec![
        DemoIdentity::from_seed("alice", [0x11; 32]),
        DemoIdentity::from_seed("bob", [0x22; 32]),
        DemoIdentity::from_seed("carol", [0x33; 32]),
    ]
}

/// Protocol faults the simulator can inject into its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalletFault {
    #[default]
    None,
    /// Drop the last element of the response array
    TruncateResponse,
    /// Sign transactions whose descriptors had no signers
    SignUnrequested,
    /// Return null for every transaction
    ReturnNullForAll,
    /// Return signed blobs with empty signature bytes
    OmitSignatureBytes,
    /// Sign an altered transaction so the id no longer matches
    SignAltered,
}

struct SimulatorInner {
    identities: Vec<DemoIdentity>,
    paired: AtomicBool,
    fault: Mutex<WalletFault>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

/// In-process wallet. Clones share one pairing and one event queue, so
/// a test can keep a handle for fault injection while the session owns
/// the channel.
#[derive(Clone)]
pub struct WalletSimulator {
    inner: Arc<SimulatorInner>,
}

impl Default for WalletSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletSimulator {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SimulatorInner {
                identities: demo_identities(),
                paired: AtomicBool::new(false),
                fault: Mutex::new(WalletFault::None),
                events_tx,
                events_rx: tokio::sync::Mutex::new(events_rx),
            }),
        }
    }

    /// Inject a fault into every subsequent response.
    pub fn set_fault(&self, fault: WalletFault) {
        *self.inner.fault.lock().expect("fault lock") = fault;
    }

    /// Addresses the simulated wallet exposes.
    pub fn accounts(&self) -> Vec<Address> {
        self.inner.identities.iter().map(|id| id.address).collect()
    }

    /// Simulate the wallet changing its exposed account list.
    pub fn push_session_update(&self, accounts: Vec<Address>) {
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::SessionUpdated { accounts });
    }

    /// Simulate a wallet-initiated disconnect.
    pub fn remote_disconnect(&self) {
        self.inner.paired.store(false, Ordering::SeqCst);
        let _ = self.inner.events_tx.send(SessionEvent::Disconnected);
    }

    fn identity_for(&self, address: &Address) -> Option<&DemoIdentity> {
        self.inner.identities.iter().find(|id| id.address == *address)
    }

    fn sign_record(&self, record: &WireTxn, fault: WalletFault) -> Result<Option<String>> {
        let raw = BASE64
            .decode(&record.txn)
            .map_err(|e| WalletError::Endpoint(format!("bad wire payload: {}", e)))?;
        let txn = Transaction::decode_unsigned(&raw)?;

        let wants_signature = !record.signers.is_empty();
        let sign_anyway = fault == WalletFault::SignUnrequested;
        if !wants_signature && !sign_anyway {
            return Ok(None);
        }
        if fault == WalletFault::ReturnNullForAll {
            return Ok(None);
        }

        // Signing key: the auth override when present, else the sender
        let key_owner = match &record.auth_addr {
            Some(s) => Address::from_str(s)?,
            None => txn.sender,
        };
        let identity = match self.identity_for(&key_owner) {
            Some(identity) => identity,
            None if sign_anyway => &self.inner.identities[0],
            None => return Ok(None),
        };

        let mut to_sign = txn.clone();
        if fault == WalletFault::SignAltered {
            to_sign.amount += 1;
        }

        let mut signed = identity.sign(&to_sign)?;
        if fault == WalletFault::OmitSignatureBytes {
            signed.sig.clear();
        }

        Ok(Some(BASE64.encode(signed.encode()?)))
    }
}

impl SignerChannel for WalletSimulator {
    async fn resume(&self) -> Result<Option<Vec<Address>>> {
        if self.inner.paired.load(Ordering::SeqCst) {
            Ok(Some(self.accounts()))
        } else {
            Ok(None)
        }
    }

    async fn pair(&self) -> Result<Pairing> {
        self.inner.paired.store(true, Ordering::SeqCst);
        let accounts = self.accounts();
        let _ = self.inner.events_tx.send(SessionEvent::Connected { accounts });
        Ok(Pairing {
            uri: "algoconnect:simulated@1?bridge=local".to_string(),
        })
    }

    async fn request(&self, request: SignRequest) -> Result<Vec<Option<String>>> {
        if !self.inner.paired.load(Ordering::SeqCst) {
            return Err(WalletError::SessionClosed);
        }
        let fault = *self.inner.fault.lock().expect("fault lock");

        let records = request.params.into_iter().next().unwrap_or_default();
        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            results.push(self.sign_record(record, fault)?);
        }

        if fault == WalletFault::TruncateResponse {
            results.pop();
        }

        Ok(results)
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.paired.store(false, Ordering::SeqCst);
        let _ = self.inner.events_tx.send(SessionEvent::Disconnected);
        Ok(())
    }

    async fn next_event(&self) -> Option<SessionEvent> {
        self.inner.events_rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::WalletTransaction;
    use crate::transaction::SuggestedParams;

    fn params() -> SuggestedParams {
        SuggestedParams {
            fee: 1000,
            first_valid: 1,
            last_valid: 1001,
            genesis_id: "testnet-v1.0".to_string(),
        }
    }

    #[test]
    fn test_demo_identities_are_stable() {
        let a = demo_identities();
        let b = demo_identities();
        assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.address, y.address);
        }
    }

    #[tokio::test]
    async fn test_simulator_signs_requested_and_skips_unsigned() {
        let sim = WalletSimulator::new();
        sim.pair().await.unwrap();
        let alice = sim.accounts()[0];

        let signed_txn = Transaction::payment(&params(), alice, Address([9; 32]), 10, b"");
        let unsigned_txn = Transaction::payment(&params(), Address([9; 32]), alice, 20, b"");
        let records = vec![
            WireTxn::from_descriptor(&WalletTransaction::signed_by_sender(signed_txn)).unwrap(),
            WireTxn::from_descriptor(&WalletTransaction::unsigned(unsigned_txn)).unwrap(),
        ];

        let results = sim.request(SignRequest::new(records)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_some());
        assert!(results[1].is_none());

        let blob = BASE64.decode(results[0].as_ref().unwrap()).unwrap();
        let signed = SignedTransaction::decode(&blob).unwrap();
        assert_eq!(signed.txn.sender, alice);
        assert!(!signed.sig.is_empty());
        assert!(signed.auth_addr.is_none());
    }

    #[tokio::test]
    async fn test_request_without_pairing_is_closed() {
        let sim = WalletSimulator::new();
        let err = sim.request(SignRequest::new(Vec::new())).await.unwrap_err();
        assert!(matches!(err, WalletError::SessionClosed));
    }

    #[tokio::test]
    async fn test_pair_emits_connected_event() {
        let sim = WalletSimulator::new();
        sim.pair().await.unwrap();
        let event = sim.next_event().await.unwrap();
        assert_eq!(
            event,
            SessionEvent::Connected {
                accounts: sim.accounts()
            }
        );
    }
}
