//! Signer channel abstraction
//!
//! A channel carries one logical pairing to an external wallet:
//! handshake, a correlated request/response exchange, and the event
//! stream feeding the session's state machine.
//!
//! Two implementations exist:
//! - `BridgeChannel`: HTTP relay to a real remote wallet
//! - `WalletSimulator`: in-process wallet for offline demos and tests

mod bridge;
mod wallet;

pub use bridge::BridgeChannel;
pub use wallet::{demo_identities, DemoIdentity, WalletFault, WalletSimulator};

use crate::batch::WalletTransaction;
use crate::error::Result;
use crate::transaction::Address;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wire method for a signing request.
pub const SIGN_METHOD: &str = "algo_signTxn";

/// Per-transaction wire record of a signing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTxn {
    /// Base64-encoded unsigned transaction payload
    pub txn: String,
    /// Addresses expected to sign; empty means "do not sign"
    pub signers: Vec<String>,
    #[serde(rename = "authAddr", skip_serializing_if = "Option::is_none")]
    pub auth_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WireTxn {
    /// Build the wire record for one descriptor.
    pub fn from_descriptor(wt: &WalletTransaction) -> Result<Self> {
        Ok(Self {
            txn: BASE64.encode(wt.txn.encode_unsigned()?),
            signers: wt.signers.iter().map(|a| a.to_string()).collect(),
            auth_addr: wt.auth_addr.map(|a| a.to_string()),
            message: wt.message.clone(),
        })
    }
}

/// JSON-RPC request envelope, one per signing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    pub id: u64,
    pub jsonrpc: String,
    pub method: String,
    /// One array of per-transaction records
    pub params: Vec<Vec<WireTxn>>,
}

impl SignRequest {
    pub fn new(txns: Vec<WireTxn>) -> Self {
        Self {
            id: next_request_id(),
            jsonrpc: "2.0".to_string(),
            method: SIGN_METHOD.to_string(),
            params: vec![txns],
        }
    }
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Millisecond timestamp plus a counter, unique within one process.
fn next_request_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    millis * 1000 + COUNTER.fetch_add(1, Ordering::Relaxed) % 1000
}

/// New pairing handshake in progress; approval arrives as a
/// [`SessionEvent::Connected`] event.
#[derive(Debug, Clone)]
pub struct Pairing {
    /// Pairing URI / QR payload for out-of-band approval
    pub uri: String,
}

/// Events the wallet side pushes into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Wallet approved the pairing (or resumed one)
    Connected { accounts: Vec<Address> },
    /// Wallet changed the exposed account list
    SessionUpdated { accounts: Vec<Address> },
    /// Wallet terminated the pairing
    Disconnected,
}

/// One logical pairing with an external wallet.
///
/// The session owns exactly one channel; at most one signing request
/// is in flight per channel.
pub trait SignerChannel: Send + Sync {
    /// Resume a prior pairing if it is still valid, yielding its
    /// account list without a new handshake.
    fn resume(&self) -> impl std::future::Future<Output = Result<Option<Vec<Address>>>> + Send;

    /// Start a new pairing handshake. The returned URI is shown to the
    /// user; approval or rejection is delivered through `next_event`.
    fn pair(&self) -> impl std::future::Future<Output = Result<Pairing>> + Send;

    /// Send one correlated signing request and suspend until the
    /// matching response arrives or the channel reports failure.
    fn request(
        &self,
        request: SignRequest,
    ) -> impl std::future::Future<Output = Result<Vec<Option<String>>>> + Send;

    /// Terminate the pairing.
    fn disconnect(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Next queued session event; `None` when the channel is gone.
    fn next_event(&self) -> impl std::future::Future<Output = Option<SessionEvent>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::WalletTransaction;
    use crate::transaction::{SuggestedParams, Transaction};

    #[test]
    fn test_wire_txn_omits_absent_fields() {
        let params = SuggestedParams {
            fee: 1000,
            first_valid: 1,
            last_valid: 1001,
            genesis_id: "testnet-v1.0".to_string(),
        };
        let txn = Transaction::payment(&params, Address([1; 32]), Address([2; 32]), 5, b"");
        let wire = WireTxn::from_descriptor(&WalletTransaction::signed_by_sender(txn)).unwrap();

        let json = serde_json::to_value(&wire).unwrap();
        assert!(json.get("authAddr").is_none());
        assert!(json.get("message").is_none());
        assert_eq!(json["signers"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = SignRequest::new(Vec::new());
        let b = SignRequest::new(Vec::new());
        assert_ne!(a.id, b.id);
        assert_eq!(a.method, SIGN_METHOD);
    }
}
