//! Transaction batch builder: scenario constructors
//!
//! Each scenario is a pure function of (network parameters snapshot,
//! active address, optional numeric argument). Sequencing parameters
//! are fetched fresh immediately before construction; group ids are
//! assigned before the batch leaves the builder.

use crate::algod::AlgodClient;
use crate::batch::{TransactionBatch, WalletTransaction};
use crate::error::{Result, WalletError};
use crate::transaction::{Address, SuggestedParams, Transaction};

/// Fixed counterparty used by the demo scenarios.
pub const DEMO_RECEIVER: Address = Address([0x5A; 32]);

/// Asset referenced by the group scenarios.
pub const DEMO_ASSET_ID: u64 = 100;

/// Application called by the app-call scenario.
pub const DEMO_APP_ID: u64 = 3061;

/// The signing scenarios the demo exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// One group of one payment, signed by the sender
    SinglePay,
    /// Group of two asset transfers, second leg left unsigned
    GroupSignOne,
    /// Group of three: opt-in, unsigned receive, payment
    GroupSignTwo,
    /// One payment whose amount is the user-supplied parameter
    PayWithAmount,
    /// Application call carrying the parameter as an argument
    AppCall,
    /// Three independent single-payment groups
    ThreeGroups,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::SinglePay,
        Scenario::GroupSignOne,
        Scenario::GroupSignTwo,
        Scenario::PayWithAmount,
        Scenario::AppCall,
        Scenario::ThreeGroups,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::SinglePay => "single-pay",
            Scenario::GroupSignOne => "group-sign-1",
            Scenario::GroupSignTwo => "group-sign-2",
            Scenario::PayWithAmount => "pay-with-amount",
            Scenario::AppCall => "app-call",
            Scenario::ThreeGroups => "three-groups",
        }
    }

    /// Whether the scenario needs a user-supplied numeric argument.
    pub fn requires_parameter(&self) -> bool {
        matches!(self, Scenario::PayWithAmount | Scenario::AppCall)
    }
}

/// Fetch fresh parameters and build the scenario's batch.
pub async fn build_batch(
    scenario: Scenario,
    algod: &AlgodClient,
    address: Address,
    param: Option<u64>,
) -> Result<TransactionBatch> {
    let params = algod.suggested_params().await?;
    build_batch_with_params(scenario, &params, address, param)
}

/// Pure construction from an already-fetched parameters snapshot.
pub fn build_batch_with_params(
    scenario: Scenario,
    params: &SuggestedParams,
    address: Address,
    param: Option<u64>,
) -> Result<TransactionBatch> {
    match scenario {
        Scenario::SinglePay => single_pay(params, address),
        Scenario::GroupSignOne => group_sign_one(params, address),
        Scenario::GroupSignTwo => group_sign_two(params, address),
        Scenario::PayWithAmount => {
            let amount = require_param(scenario, param)?;
            pay_with_amount(params, address, amount)
        }
        Scenario::AppCall => {
            let arg = require_param(scenario, param)?;
            app_call(params, address, arg)
        }
        Scenario::ThreeGroups => three_groups(params, address),
    }
}

fn require_param(scenario: Scenario, param: Option<u64>) -> Result<u64> {
    param.ok_or(WalletError::ParameterRequired {
        scenario: scenario.name(),
    })
}

fn single_pay(params: &SuggestedParams, address: Address) -> Result<TransactionBatch> {
    let txn = Transaction::payment(
        params,
        address,
        DEMO_RECEIVER,
        100_000,
        b"this is a single payment txn",
    );
    TransactionBatch::new(vec![vec![
        WalletTransaction::signed_by_sender(txn).with_message("Single payment")
    ]])
}

fn group_sign_one(params: &SuggestedParams, address: Address) -> Result<TransactionBatch> {
    let opt_in = Transaction::asset_transfer(
        params,
        address,
        address,
        DEMO_ASSET_ID,
        0,
        b"this is an opt-in txn",
    );
    let receive = Transaction::asset_transfer(
        params,
        DEMO_RECEIVER,
        address,
        DEMO_ASSET_ID,
        1_000_000,
        b"this is an asset receive txn",
    );
    TransactionBatch::new(vec![vec![
        WalletTransaction::signed_by_sender(opt_in).with_message("Opt in to the asset"),
        WalletTransaction::unsigned(receive),
    ]])
}

fn group_sign_two(params: &SuggestedParams, address: Address) -> Result<TransactionBatch> {
    let opt_in = Transaction::asset_transfer(
        params,
        address,
        address,
        DEMO_ASSET_ID,
        0,
        b"this is an opt-in txn",
    );
    let receive = Transaction::asset_transfer(
        params,
        DEMO_RECEIVER,
        address,
        DEMO_ASSET_ID,
        1_000_000,
        b"this is an asset receive txn",
    );
    let payment = Transaction::payment(
        params,
        address,
        DEMO_RECEIVER,
        500_000,
        b"this is a payment txn",
    );
    TransactionBatch::new(vec![vec![
        WalletTransaction::signed_by_sender(opt_in).with_message("Opt in to the asset"),
        WalletTransaction::unsigned(receive),
        WalletTransaction::signed_by_sender(payment).with_message("Pay for the asset"),
    ]])
}

fn pay_with_amount(
    params: &SuggestedParams,
    address: Address,
    amount: u64,
) -> Result<TransactionBatch> {
    let txn = Transaction::payment(
        params,
        address,
        DEMO_RECEIVER,
        amount,
        b"payment with user-supplied amount",
    );
    TransactionBatch::new(vec![vec![WalletTransaction::signed_by_sender(txn)
        .with_message("Payment with the amount you entered")]])
}

fn app_call(params: &SuggestedParams, address: Address, arg: u64) -> Result<TransactionBatch> {
    let txn = Transaction::app_call(
        params,
        address,
        DEMO_APP_ID,
        vec![arg.to_be_bytes().to_vec()],
        b"this is an app call txn",
    );
    TransactionBatch::new(vec![vec![
        WalletTransaction::signed_by_sender(txn).with_message("Application call")
    ]])
}

fn three_groups(params: &SuggestedParams, address: Address) -> Result<TransactionBatch> {
    let groups = (1..=3u64)
        .map(|i| {
            let txn = Transaction::payment(
                params,
                address,
                DEMO_RECEIVER,
                i * 100_000,
                format!("independent payment {}", i).as_bytes(),
            );
            vec![WalletTransaction::signed_by_sender(txn)]
        })
        .collect();
    TransactionBatch::new(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SuggestedParams {
        SuggestedParams {
            fee: 1000,
            first_valid: 100,
            last_valid: 1100,
            genesis_id: "testnet-v1.0".to_string(),
        }
    }

    fn address() -> Address {
        Address([7; 32])
    }

    #[test]
    fn test_single_pay_is_one_group_of_one() {
        let batch =
            build_batch_with_params(Scenario::SinglePay, &params(), address(), None).unwrap();
        assert_eq!(batch.num_groups(), 1);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.groups()[0][0].signers, vec![address()]);
        assert!(batch.groups()[0][0].txn.group.is_some());
    }

    #[test]
    fn test_group_scenarios_mark_external_legs_unsigned() {
        let batch =
            build_batch_with_params(Scenario::GroupSignTwo, &params(), address(), None).unwrap();
        let group = &batch.groups()[0];
        assert_eq!(group.len(), 3);
        assert!(!group[0].signers.is_empty());
        assert!(group[1].signers.is_empty());
        assert!(!group[2].signers.is_empty());
        assert_eq!(group[1].txn.sender, DEMO_RECEIVER);
    }

    #[test]
    fn test_parameterized_scenarios_require_argument() {
        for scenario in [Scenario::PayWithAmount, Scenario::AppCall] {
            let err = build_batch_with_params(scenario, &params(), address(), None).unwrap_err();
            assert!(matches!(err, WalletError::ParameterRequired { .. }));

            let batch =
                build_batch_with_params(scenario, &params(), address(), Some(42)).unwrap();
            assert_eq!(batch.len(), 1);
        }
    }

    #[test]
    fn test_app_call_carries_argument() {
        let batch =
            build_batch_with_params(Scenario::AppCall, &params(), address(), Some(7)).unwrap();
        let txn = &batch.groups()[0][0].txn;
        assert_eq!(txn.app_id, Some(DEMO_APP_ID));
        assert_eq!(txn.app_args, vec![7u64.to_be_bytes().to_vec()]);
    }

    #[test]
    fn test_three_groups_are_independent() {
        let batch =
            build_batch_with_params(Scenario::ThreeGroups, &params(), address(), None).unwrap();
        assert_eq!(batch.num_groups(), 3);

        let gids: Vec<_> = batch
            .groups()
            .iter()
            .map(|g| g[0].txn.group.unwrap())
            .collect();
        assert_ne!(gids[0], gids[1]);
        assert_ne!(gids[1], gids[2]);
    }

    #[test]
    fn test_builders_are_deterministic() {
        let a = build_batch_with_params(Scenario::GroupSignOne, &params(), address(), None)
            .unwrap();
        let b = build_batch_with_params(Scenario::GroupSignOne, &params(), address(), None)
            .unwrap();
        assert_eq!(
            a.groups()[0][0].txn.group.unwrap(),
            b.groups()[0][0].txn.group.unwrap()
        );
    }
}
