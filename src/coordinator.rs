//! Signing request coordinator
//!
//! Orchestrates one user-initiated signing operation end to end:
//! build the batch, flatten it into wire records, dispatch over the
//! session, validate the response against the original request, and
//! publish the re-grouped result. Any failure between construction
//! and validation collapses the whole operation to `Rejected`; no
//! partial result is ever published.

use crate::algod::AlgodClient;
use crate::batch::{TransactionBatch, WalletTransaction};
use crate::channel::{demo_identities, SignerChannel, WireTxn};
use crate::error::{Result, WalletError};
use crate::scenarios::{build_batch, Scenario};
use crate::session::SignerSession;
use crate::store::StateStore;
use crate::transaction::{Address, SignedTransaction, TxId};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::{Arc, Mutex};

/// Per-transaction outcome of a validated signing operation.
/// `None` slots are transactions intentionally left unsigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTxnInfo {
    pub tx_id: TxId,
    /// Signing key owner when it differs from the sender
    pub signing_address: Option<Address>,
    pub signature: Vec<u8>,
    /// Raw signed blob, ready for submission
    pub raw: Vec<u8>,
}

/// Validated result of one operation, preserving group structure.
pub type GroupedResults = Vec<Vec<Option<SignedTxnInfo>>>;

/// State machine of one signing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationPhase {
    #[default]
    Idle,
    AwaitingUserParameter,
    RequestSent,
    Validating,
    Done,
    Rejected,
}

/// Coordinates signing operations over one live session.
pub struct SigningCoordinator<C: SignerChannel> {
    session: Arc<SignerSession<C>>,
    algod: AlgodClient,
    store: StateStore,
    phase: Mutex<OperationPhase>,
    /// Offline-harness flag: substitute local signatures for unsigned
    /// legs whose sender is a demo identity. Never set in production.
    local_signing: bool,
}

impl<C: SignerChannel> SigningCoordinator<C> {
    pub fn new(session: Arc<SignerSession<C>>, algod: AlgodClient, store: StateStore) -> Self {
        Self {
            session,
            algod,
            store,
            phase: Mutex::new(OperationPhase::Idle),
            local_signing: false,
        }
    }

    /// Enable the local-substitution path for offline scenario testing.
    pub fn with_local_signing(mut self) -> Self {
        self.local_signing = true;
        self
    }

    /// Current phase of the coordinator's operation state machine.
    pub fn phase(&self) -> OperationPhase {
        *self.phase.lock().expect("phase lock")
    }

    fn set_phase(&self, phase: OperationPhase) {
        tracing::debug!("coordinator phase -> {:?}", phase);
        *self.phase.lock().expect("phase lock") = phase;
    }

    /// Run one scenario end to end.
    ///
    /// When the scenario needs a numeric parameter and none was given,
    /// the coordinator parks in `AwaitingUserParameter`, publishes a
    /// prompt for the output layer, and returns `ParameterRequired`;
    /// the caller re-invokes with the supplied value to resume.
    pub async fn run_scenario(
        &self,
        scenario: Scenario,
        param: Option<u64>,
    ) -> Result<GroupedResults> {
        if scenario.requires_parameter() && param.is_none() {
            self.set_phase(OperationPhase::AwaitingUserParameter);
            self.store
                .update(|s| s.parameter_prompt = Some(scenario));
            return Err(WalletError::ParameterRequired {
                scenario: scenario.name(),
            });
        }
        self.store.update(|s| s.parameter_prompt = None);

        let address = match self.session.primary_address() {
            Some(address) => address,
            None => {
                self.reject(&WalletError::SessionClosed);
                return Err(WalletError::SessionClosed);
            }
        };

        let batch = match build_batch(scenario, &self.algod, address, param).await {
            Ok(batch) => batch,
            Err(e) => {
                self.reject(&e);
                return Err(e);
            }
        };

        self.sign_batch(batch).await
    }

    /// Decline a pending parameter prompt, aborting before dispatch.
    pub fn cancel_parameter(&self) {
        self.store.update(|s| s.parameter_prompt = None);
        self.set_phase(OperationPhase::Idle);
    }

    /// Dispatch an already-built batch and validate the response.
    pub async fn sign_batch(&self, batch: TransactionBatch) -> Result<GroupedResults> {
        self.store.update(|s| s.pending_request = true);

        match self.execute(&batch).await {
            Ok(grouped) => {
                self.set_phase(OperationPhase::Done);
                self.store.update(|s| {
                    s.pending_request = false;
                    s.last_result = Some(grouped.clone());
                });
                Ok(grouped)
            }
            Err(e) => {
                self.reject(&e);
                Err(e)
            }
        }
    }

    fn reject(&self, error: &WalletError) {
        tracing::error!("signing operation rejected: {}", error);
        self.set_phase(OperationPhase::Rejected);
        self.store.update(|s| {
            s.pending_request = false;
            s.last_result = None;
        });
    }

    async fn execute(&self, batch: &TransactionBatch) -> Result<GroupedResults> {
        let (flat, _index_map) = batch.flatten();
        let records: Vec<WireTxn> = flat
            .iter()
            .map(|wt| WireTxn::from_descriptor(wt))
            .collect::<Result<_>>()?;

        self.set_phase(OperationPhase::RequestSent);
        let responses = self.session.sign_request(records).await?;
        self.set_phase(OperationPhase::Validating);

        if responses.len() != flat.len() {
            return Err(WalletError::ResponseLengthMismatch {
                got: responses.len(),
                expected: flat.len(),
            });
        }

        let mut results = Vec::with_capacity(flat.len());
        for (index, (descriptor, response)) in flat.iter().zip(responses).enumerate() {
            results.push(self.validate_one(index, descriptor, response)?);
        }

        batch.unflatten(results)
    }

    /// Validate one response slot against its descriptor.
    fn validate_one(
        &self,
        index: usize,
        descriptor: &WalletTransaction,
        response: Option<String>,
    ) -> Result<Option<SignedTxnInfo>> {
        let Some(blob_b64) = response else {
            if !descriptor.signers.is_empty() {
                return Err(WalletError::UnexpectedlyUnsigned { index });
            }
            if self.local_signing {
                return self.substitute_local(descriptor).map(Some);
            }
            return Ok(None);
        };

        if descriptor.signers.is_empty() {
            return Err(WalletError::UnexpectedlySigned { index });
        }

        let raw = BASE64.decode(&blob_b64).map_err(|e| {
            WalletError::Endpoint(format!("response {} is not valid base64: {}", index, e))
        })?;
        let signed = SignedTransaction::decode(&raw)?;

        if signed.sig.is_empty() {
            return Err(WalletError::MissingSignature { index });
        }

        let got = signed.txn.id()?;
        let expected = descriptor.txn.id()?;
        if got != expected {
            return Err(WalletError::SignatureMismatch {
                index,
                got,
                expected,
            });
        }

        Ok(Some(SignedTxnInfo {
            tx_id: got,
            signing_address: signed.auth_addr,
            signature: signed.sig,
            raw,
        }))
    }

    /// Offline-harness path: fill in a local signature for an unsigned
    /// leg whose sender is one of the fixed demo identities.
    fn substitute_local(&self, descriptor: &WalletTransaction) -> Result<SignedTxnInfo> {
        let sender = descriptor.txn.sender;
        let identities = demo_identities();
        let identity = identities
            .iter()
            .find(|id| id.address == sender)
            .ok_or(WalletError::UnknownSigner { sender })?;

        let signed = identity.sign(&descriptor.txn)?;
        let raw = signed.encode()?;
        tracing::debug!("substituted local signature from {}", identity.name);
        Ok(SignedTxnInfo {
            tx_id: signed.txn.id()?,
            signing_address: signed.auth_addr,
            signature: signed.sig,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::WalletTransaction;
    use crate::channel::{WalletFault, WalletSimulator};
    use crate::config::ClientConfig;
    use crate::scenarios::{build_batch_with_params, DEMO_RECEIVER};
    use crate::transaction::{SuggestedParams, Transaction};

    fn params() -> SuggestedParams {
        SuggestedParams {
            fee: 1000,
            first_valid: 100,
            last_valid: 1100,
            genesis_id: "testnet-v1.0".to_string(),
        }
    }

    async fn coordinator_with_sim() -> (SigningCoordinator<WalletSimulator>, WalletSimulator) {
        let sim = WalletSimulator::new();
        let store = StateStore::new();
        let config = ClientConfig::default();
        let session = Arc::new(SignerSession::new(sim.clone(), &config, store.clone()));
        session.connect().await.unwrap();
        let algod = AlgodClient::new(&config);
        (SigningCoordinator::new(session, algod, store), sim)
    }

    fn store_of<C: SignerChannel>(coordinator: &SigningCoordinator<C>) -> &StateStore {
        &coordinator.store
    }

    #[tokio::test]
    async fn test_single_transaction_reaches_done() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];

        let batch =
            build_batch_with_params(Scenario::SinglePay, &params(), alice, None).unwrap();
        let expected_id = batch.groups()[0][0].txn.id().unwrap();

        let grouped = coordinator.sign_batch(batch).await.unwrap();
        assert_eq!(coordinator.phase(), OperationPhase::Done);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].len(), 1);

        let info = grouped[0][0].as_ref().unwrap();
        assert_eq!(info.tx_id, expected_id);
        assert!(!info.signature.is_empty());

        let snap = store_of(&coordinator).snapshot();
        assert!(!snap.pending_request);
        assert!(snap.last_result.is_some());
    }

    #[tokio::test]
    async fn test_unsigned_leg_stays_null_without_local_signing() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];

        // Second leg's sender is the fixed demo receiver, not a demo
        // identity: the wallet returns null and the substitution path
        // must never trigger on a production coordinator.
        let batch =
            build_batch_with_params(Scenario::GroupSignOne, &params(), alice, None).unwrap();
        let grouped = coordinator.sign_batch(batch).await.unwrap();

        assert_eq!(coordinator.phase(), OperationPhase::Done);
        assert!(grouped[0][0].is_some());
        assert!(grouped[0][1].is_none());
    }

    #[tokio::test]
    async fn test_group_structure_survives_round_trip() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];

        let batch =
            build_batch_with_params(Scenario::ThreeGroups, &params(), alice, None).unwrap();
        let grouped = coordinator.sign_batch(batch).await.unwrap();

        assert_eq!(grouped.len(), 3);
        for group in &grouped {
            assert_eq!(group.len(), 1);
            assert!(group[0].is_some());
        }
    }

    #[tokio::test]
    async fn test_unexpectedly_unsigned() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];
        sim.set_fault(WalletFault::ReturnNullForAll);

        let batch =
            build_batch_with_params(Scenario::SinglePay, &params(), alice, None).unwrap();
        let err = coordinator.sign_batch(batch).await.unwrap_err();

        assert!(matches!(err, WalletError::UnexpectedlyUnsigned { index: 0 }));
        assert_eq!(coordinator.phase(), OperationPhase::Rejected);
    }

    #[tokio::test]
    async fn test_unexpectedly_signed() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];
        sim.set_fault(WalletFault::SignUnrequested);

        let batch =
            build_batch_with_params(Scenario::GroupSignOne, &params(), alice, None).unwrap();
        let err = coordinator.sign_batch(batch).await.unwrap_err();

        assert!(matches!(err, WalletError::UnexpectedlySigned { index: 1 }));
    }

    #[tokio::test]
    async fn test_missing_signature() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];
        sim.set_fault(WalletFault::OmitSignatureBytes);

        let batch =
            build_batch_with_params(Scenario::SinglePay, &params(), alice, None).unwrap();
        let err = coordinator.sign_batch(batch).await.unwrap_err();

        assert!(matches!(err, WalletError::MissingSignature { index: 0 }));
    }

    #[tokio::test]
    async fn test_signature_mismatch_names_index() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];
        sim.set_fault(WalletFault::SignAltered);

        let batch =
            build_batch_with_params(Scenario::SinglePay, &params(), alice, None).unwrap();
        let err = coordinator.sign_batch(batch).await.unwrap_err();

        assert!(matches!(err, WalletError::SignatureMismatch { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_length_mismatch_fails_closed() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];
        sim.set_fault(WalletFault::TruncateResponse);

        let batch =
            build_batch_with_params(Scenario::GroupSignTwo, &params(), alice, None).unwrap();
        let err = coordinator.sign_batch(batch).await.unwrap_err();

        assert!(matches!(
            err,
            WalletError::ResponseLengthMismatch {
                got: 2,
                expected: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_rejection_clears_pending_and_prior_result() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let alice = sim.accounts()[0];

        // Successful run populates last_result
        let batch =
            build_batch_with_params(Scenario::SinglePay, &params(), alice, None).unwrap();
        coordinator.sign_batch(batch).await.unwrap();
        assert!(store_of(&coordinator).snapshot().last_result.is_some());

        // Failed run clears it, publishing nothing partial
        sim.set_fault(WalletFault::SignAltered);
        let batch =
            build_batch_with_params(Scenario::SinglePay, &params(), alice, None).unwrap();
        coordinator.sign_batch(batch).await.unwrap_err();

        let snap = store_of(&coordinator).snapshot();
        assert!(!snap.pending_request);
        assert!(snap.last_result.is_none());
        assert_eq!(coordinator.phase(), OperationPhase::Rejected);
    }

    #[tokio::test]
    async fn test_parameter_prompt_and_cancel() {
        let (coordinator, _sim) = coordinator_with_sim().await;

        let err = coordinator
            .run_scenario(Scenario::PayWithAmount, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::ParameterRequired { .. }));
        assert_eq!(coordinator.phase(), OperationPhase::AwaitingUserParameter);
        assert_eq!(
            store_of(&coordinator).snapshot().parameter_prompt,
            Some(Scenario::PayWithAmount)
        );

        coordinator.cancel_parameter();
        assert_eq!(coordinator.phase(), OperationPhase::Idle);
        assert!(store_of(&coordinator).snapshot().parameter_prompt.is_none());
    }

    #[tokio::test]
    async fn test_local_substitution_for_known_identity() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let coordinator = coordinator.with_local_signing();
        let alice = sim.accounts()[0];
        let bob = sim.accounts()[1];

        let pay = Transaction::payment(&params(), alice, bob, 10, b"signed leg");
        let external = Transaction::payment(&params(), bob, alice, 20, b"local leg");
        let batch = TransactionBatch::new(vec![vec![
            WalletTransaction::signed_by_sender(pay),
            WalletTransaction::unsigned(external),
        ]])
        .unwrap();

        let grouped = coordinator.sign_batch(batch).await.unwrap();
        let substituted = grouped[0][1].as_ref().unwrap();
        assert!(!substituted.signature.is_empty());
    }

    #[tokio::test]
    async fn test_local_substitution_unknown_signer_is_fatal() {
        let (coordinator, sim) = coordinator_with_sim().await;
        let coordinator = coordinator.with_local_signing();
        let alice = sim.accounts()[0];

        let pay = Transaction::payment(&params(), alice, DEMO_RECEIVER, 10, b"");
        let external = Transaction::payment(&params(), DEMO_RECEIVER, alice, 20, b"");
        let batch = TransactionBatch::new(vec![vec![
            WalletTransaction::signed_by_sender(pay),
            WalletTransaction::unsigned(external),
        ]])
        .unwrap();

        let err = coordinator.sign_batch(batch).await.unwrap_err();
        assert!(matches!(err, WalletError::UnknownSigner { .. }));
        assert_eq!(coordinator.phase(), OperationPhase::Rejected);
    }
}
