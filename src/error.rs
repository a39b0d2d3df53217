//! Error taxonomy for the wallet client
//!
//! Protocol and validation failures are typed so callers can match on
//! them; transport errors from the HTTP layer are wrapped.

use crate::transaction::{Address, TxId};
use thiserror::Error;

/// Errors produced by the session, coordinator, and tracker.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Pairing handshake was rejected by the wallet or timed out.
    #[error("pairing failed: {0}")]
    Pairing(String),

    /// A session operation was invoked after `kill()` or before `connect()`.
    #[error("session is closed")]
    SessionClosed,

    /// A second signing request was issued while one is still pending.
    #[error("a signing request is already in flight")]
    RequestInFlight,

    /// Scenario needs a numeric argument and none was supplied.
    #[error("scenario '{scenario}' requires a numeric parameter")]
    ParameterRequired { scenario: &'static str },

    /// Wallet signed a transaction whose descriptor had no signers.
    #[error("transaction at index {index} was signed but should not have been")]
    UnexpectedlySigned { index: usize },

    /// Wallet returned null for a transaction that required a signature.
    #[error("transaction at index {index} was not signed")]
    UnexpectedlyUnsigned { index: usize },

    /// Signed blob carried no signature bytes.
    #[error("signed transaction at index {index} is missing its signature")]
    MissingSignature { index: usize },

    /// Signed transaction does not round-trip to the unsigned one.
    #[error("signed transaction at index {index} differs from unsigned transaction: got {got}, expected {expected}")]
    SignatureMismatch {
        index: usize,
        got: TxId,
        expected: TxId,
    },

    /// Wallet response length disagrees with the flattened request.
    #[error("wallet returned {got} results for {expected} transactions")]
    ResponseLengthMismatch { got: usize, expected: usize },

    /// Network rejected a submitted group from its transaction pool.
    #[error("transaction pool rejected group: {reason}")]
    PoolRejected { reason: String },

    /// Local-substitution path found no demo identity for a sender.
    #[error("no local identity for sender {sender}")]
    UnknownSigner { sender: Address },

    /// HTTP transport failure talking to the bridge or node.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Canonical transaction encoding failed.
    #[error("transaction encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    /// Bridge or node endpoint returned a non-success status.
    #[error("endpoint error: {0}")]
    Endpoint(String),
}

pub type Result<T, E = WalletError> = std::result::Result<T, E>;
