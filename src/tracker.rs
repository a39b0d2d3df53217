//! Submission and confirmation tracker
//!
//! Broadcasts validated signed groups and polls each until finality.
//! Group submissions run as independent concurrent tasks; each task
//! owns exactly one slot of the outcome array and terminal outcomes
//! never revert.

use crate::algod::SubmitEndpoint;
use crate::config::ClientConfig;
use crate::coordinator::GroupedResults;
use crate::error::{Result, WalletError};
use crate::store::StateStore;
use futures::future::join_all;

/// Lifecycle of one submitted group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Submitted, no confirmation yet
    Pending,
    /// Confirmed at the given round
    Confirmed(u64),
    /// Pool rejection or transport failure; terminal, no retry
    Failed(String),
}

/// Tracks submissions of signed groups against the write endpoint.
pub struct SubmissionTracker<E: SubmitEndpoint> {
    endpoint: E,
    store: StateStore,
    max_confirm_rounds: u64,
}

impl<E: SubmitEndpoint> SubmissionTracker<E> {
    pub fn new(endpoint: E, store: StateStore, config: &ClientConfig) -> Self {
        Self {
            endpoint,
            store,
            max_confirm_rounds: config.max_confirm_rounds,
        }
    }

    /// Submit every group of a validated result concurrently and wait
    /// for all of them to reach a terminal outcome. Outcomes land in
    /// the store slot by slot as they complete.
    pub async fn submit_all(&self, results: &GroupedResults) -> Vec<SubmissionOutcome> {
        let groups: Vec<Vec<u8>> = results
            .iter()
            .map(|group| {
                group
                    .iter()
                    .flatten()
                    .flat_map(|info| info.raw.clone())
                    .collect()
            })
            .collect();

        self.store
            .update(|s| s.submission_outcomes = vec![SubmissionOutcome::Pending; groups.len()]);

        let tasks = groups.into_iter().enumerate().map(|(index, blob)| {
            let endpoint = self.endpoint.clone();
            let store = self.store.clone();
            let max_rounds = self.max_confirm_rounds;
            tokio::spawn(async move {
                let outcome = match submit_group(&endpoint, blob, max_rounds).await {
                    Ok(round) => SubmissionOutcome::Confirmed(round),
                    Err(WalletError::PoolRejected { reason }) => {
                        tracing::warn!("group {} rejected by pool: {}", index, reason);
                        SubmissionOutcome::Failed(reason)
                    }
                    Err(e) => {
                        tracing::warn!("group {} submission failed: {}", index, e);
                        SubmissionOutcome::Failed(e.to_string())
                    }
                };
                record_outcome(&store, index, outcome.clone());
                (index, outcome)
            })
        });

        let mut outcomes = vec![SubmissionOutcome::Pending; results.len()];
        for joined in join_all(tasks).await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = outcome,
                Err(e) => tracing::error!("submission task panicked: {}", e),
            }
        }
        outcomes
    }
}

/// Write one group's terminal outcome into its slot, leaving sibling
/// slots untouched.
fn record_outcome(store: &StateStore, index: usize, outcome: SubmissionOutcome) {
    store.update(|s| {
        if let Some(slot) = s.submission_outcomes.get_mut(index) {
            *slot = outcome;
        }
    });
}

/// Broadcast one group and poll round by round until it confirms or
/// the pool rejects it.
async fn submit_group<E: SubmitEndpoint>(endpoint: &E, blob: Vec<u8>, max_rounds: u64) -> Result<u64> {
    let tx_id = endpoint.submit_raw(blob).await?;
    tracing::info!("submitted group, txid {}", tx_id);

    let mut round = endpoint.current_round().await?;
    for _ in 0..max_rounds {
        let info = endpoint.pending_info(&tx_id).await?;

        if !info.pool_error.is_empty() {
            return Err(WalletError::PoolRejected {
                reason: info.pool_error,
            });
        }
        if let Some(confirmed) = info.confirmed_round {
            if confirmed > 0 {
                tracing::info!("txid {} confirmed in round {}", tx_id, confirmed);
                return Ok(confirmed);
            }
        }

        round = endpoint.wait_for_round_after(round).await?;
    }

    Err(WalletError::Endpoint(format!(
        "txid {} not confirmed after {} rounds",
        tx_id, max_rounds
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algod::PendingInfo;
    use crate::coordinator::SignedTxnInfo;
    use crate::transaction::TxId;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Endpoint scripted by the first byte of each group's blob.
    #[derive(Clone, Default)]
    struct ScriptedEndpoint {
        polls: Arc<Mutex<HashMap<u8, u32>>>,
    }

    impl SubmitEndpoint for ScriptedEndpoint {
        async fn submit_raw(&self, blob: Vec<u8>) -> Result<TxId> {
            Ok(TxId([blob[0]; 32]))
        }

        async fn pending_info(&self, tx_id: &TxId) -> Result<PendingInfo> {
            let tag = tx_id.0[0];
            let mut polls = self.polls.lock().expect("polls lock");
            let count = polls.entry(tag).or_insert(0);
            *count += 1;

            let info = match tag {
                // confirms on the first poll
                1 => PendingInfo {
                    confirmed_round: Some(101),
                    pool_error: String::new(),
                },
                // rejected by the pool
                2 => PendingInfo {
                    confirmed_round: None,
                    pool_error: "overspend".to_string(),
                },
                // confirms once a round has passed
                3 if *count >= 2 => PendingInfo {
                    confirmed_round: Some(103),
                    pool_error: String::new(),
                },
                _ => PendingInfo {
                    confirmed_round: None,
                    pool_error: String::new(),
                },
            };
            Ok(info)
        }

        async fn current_round(&self) -> Result<u64> {
            Ok(100)
        }

        async fn wait_for_round_after(&self, round: u64) -> Result<u64> {
            Ok(round + 1)
        }
    }

    fn signed(tag: u8) -> Option<SignedTxnInfo> {
        Some(SignedTxnInfo {
            tx_id: TxId([tag; 32]),
            signing_address: None,
            signature: vec![1],
            raw: vec![tag],
        })
    }

    #[tokio::test]
    async fn test_submit_all_classifies_groups_through_the_endpoint() {
        let store = StateStore::new();
        let tracker = SubmissionTracker::new(
            ScriptedEndpoint::default(),
            store.clone(),
            &ClientConfig::default(),
        );

        let results: GroupedResults = vec![vec![signed(1)], vec![signed(2), None], vec![signed(3)]];
        let outcomes = tracker.submit_all(&results).await;

        assert_eq!(outcomes[0], SubmissionOutcome::Confirmed(101));
        assert_eq!(outcomes[1], SubmissionOutcome::Failed("overspend".to_string()));
        assert_eq!(outcomes[2], SubmissionOutcome::Confirmed(103));
        assert_eq!(store.snapshot().submission_outcomes, outcomes);
    }

    #[tokio::test]
    async fn test_unconfirmed_group_fails_after_round_budget() {
        let endpoint = ScriptedEndpoint::default();
        let store = StateStore::new();
        let tracker =
            SubmissionTracker::new(endpoint.clone(), store.clone(), &ClientConfig::default());

        let results: GroupedResults = vec![vec![signed(9)]];
        let outcomes = tracker.submit_all(&results).await;

        assert!(matches!(
            &outcomes[0],
            SubmissionOutcome::Failed(reason) if reason.contains("not confirmed")
        ));
        // One pending-info poll per round of the budget
        assert_eq!(*endpoint.polls.lock().unwrap().get(&9).unwrap(), 10);
    }

    #[tokio::test]
    async fn test_outcome_slots_are_independent_of_completion_order() {
        let store = StateStore::new();
        store.update(|s| s.submission_outcomes = vec![SubmissionOutcome::Pending; 3]);

        // Slot 1 fails first, then 2 confirms, then 0; the final array
        // must reflect per-slot outcomes regardless of that order.
        let completions = vec![
            (1usize, SubmissionOutcome::Failed("overspend".to_string()), 0u64),
            (2, SubmissionOutcome::Confirmed(1002), 10),
            (0, SubmissionOutcome::Confirmed(1001), 20),
        ];

        let tasks: Vec<_> = completions
            .into_iter()
            .map(|(index, outcome, delay_ms)| {
                let store = store.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    record_outcome(&store, index, outcome);
                })
            })
            .collect();
        join_all(tasks).await;

        let outcomes = store.snapshot().submission_outcomes;
        assert_eq!(outcomes[0], SubmissionOutcome::Confirmed(1001));
        assert_eq!(outcomes[1], SubmissionOutcome::Failed("overspend".to_string()));
        assert_eq!(outcomes[2], SubmissionOutcome::Confirmed(1002));
    }

    #[test]
    fn test_record_outcome_ignores_out_of_range_slot() {
        let store = StateStore::new();
        store.update(|s| s.submission_outcomes = vec![SubmissionOutcome::Pending]);
        record_outcome(&store, 5, SubmissionOutcome::Confirmed(1));
        assert_eq!(
            store.snapshot().submission_outcomes,
            vec![SubmissionOutcome::Pending]
        );
    }
}
