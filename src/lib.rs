//! Reference client for wallet-based transaction signing
//!
//! Connects a local application to an external signing wallet over a
//! session-oriented RPC channel: pairing handshake, event-driven
//! session state, batched signing requests validated against the
//! original unsigned payloads, and submission with confirmation
//! polling.
//!
//! # Example
//!
//! ```rust,ignore
//! use algoconnect::{
//!     AlgodClient, ClientConfig, Scenario, SignerSession, SigningCoordinator, StateStore,
//!     SubmissionTracker, WalletSimulator,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     let config = ClientConfig::default();
//!     let store = StateStore::new();
//!     let session = Arc::new(SignerSession::new(
//!         WalletSimulator::new(),
//!         &config,
//!         store.clone(),
//!     ));
//!     session.connect().await?;
//!
//!     let algod = AlgodClient::new(&config);
//!     let coordinator = SigningCoordinator::new(session, algod.clone(), store.clone());
//!     let result = coordinator.run_scenario(Scenario::SinglePay, None).await?;
//!
//!     let tracker = SubmissionTracker::new(algod, store, &config);
//!     let outcomes = tracker.submit_all(&result).await;
//!     println!("{:?}", outcomes);
//!     Ok(())
//! }
//! ```

pub mod algod;
pub mod batch;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod scenarios;
pub mod session;
pub mod store;
pub mod tracker;
pub mod transaction;

// Re-export main types for convenience
pub use algod::{AlgodClient, AssetData, PendingInfo, SubmitEndpoint};
pub use batch::{TransactionBatch, WalletTransaction};
pub use channel::{
    demo_identities, BridgeChannel, DemoIdentity, SessionEvent, SignerChannel, WalletFault,
    WalletSimulator, WireTxn,
};
pub use config::ClientConfig;
pub use coordinator::{GroupedResults, OperationPhase, SignedTxnInfo, SigningCoordinator};
pub use error::{Result, WalletError};
pub use scenarios::{build_batch, Scenario};
pub use session::{SessionState, SignerSession};
pub use store::{AppState, ConnectionState, StateStore};
pub use tracker::{SubmissionOutcome, SubmissionTracker};
pub use transaction::{
    compute_group_id, Address, GroupId, SignedTransaction, SuggestedParams, Transaction, TxId,
};
