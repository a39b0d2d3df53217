//! Transaction batches: signing descriptors, grouping, flattening
//!
//! A batch is an ordered sequence of atomic groups. The wire request
//! is flat, so the batch carries an invertible mapping between the
//! flattened index and the (group, offset) position; any length
//! disagreement on the way back fails closed.

use crate::error::{Result, WalletError};
use crate::transaction::{compute_group_id, Address, Transaction};

/// One transaction plus its signing metadata.
#[derive(Debug, Clone)]
pub struct WalletTransaction {
    pub txn: Transaction,
    /// Addresses expected to sign; empty means "do not sign"
    pub signers: Vec<Address>,
    /// Override address whose key must produce the signature
    pub auth_addr: Option<Address>,
    /// Human-readable intent, shown by the wallet before approval
    pub message: Option<String>,
}

impl WalletTransaction {
    /// Descriptor to be signed by the transaction's sender.
    pub fn signed_by_sender(txn: Transaction) -> Self {
        let sender = txn.sender;
        Self {
            txn,
            signers: vec![sender],
            auth_addr: None,
            message: None,
        }
    }

    /// Descriptor the wallet must leave unsigned.
    pub fn unsigned(txn: Transaction) -> Self {
        Self {
            txn,
            signers: Vec::new(),
            auth_addr: None,
            message: None,
        }
    }

    /// Attach a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Ordered groups of signing descriptors.
#[derive(Debug, Clone, Default)]
pub struct TransactionBatch {
    groups: Vec<Vec<WalletTransaction>>,
}

impl TransactionBatch {
    /// Build a batch and tag every group with its group id.
    ///
    /// Single transactions are modeled as one-element groups and get a
    /// group id like any other group.
    pub fn new(groups: Vec<Vec<WalletTransaction>>) -> Result<Self> {
        let mut batch = Self { groups };
        batch.assign_group_ids()?;
        Ok(batch)
    }

    /// Compute and assign the shared group id of each group, over the
    /// ordered transactions of that group only.
    fn assign_group_ids(&mut self) -> Result<()> {
        for group in &mut self.groups {
            let txns: Vec<Transaction> = group.iter().map(|wt| wt.txn.clone()).collect();
            let gid = compute_group_id(&txns)?;
            for wt in group.iter_mut() {
                wt.txn.group = Some(gid);
            }
        }
        Ok(())
    }

    pub fn groups(&self) -> &[Vec<WalletTransaction>] {
        &self.groups
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Total number of transactions across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linearize the groups for wire transmission, preserving group
    /// boundaries via the returned (group, offset) index map.
    pub fn flatten(&self) -> (Vec<&WalletTransaction>, Vec<(usize, usize)>) {
        let mut flat = Vec::with_capacity(self.len());
        let mut index_map = Vec::with_capacity(self.len());
        for (g, group) in self.groups.iter().enumerate() {
            for (i, wt) in group.iter().enumerate() {
                flat.push(wt);
                index_map.push((g, i));
            }
        }
        (flat, index_map)
    }

    /// Inverse of [`flatten`]: reassemble flat per-transaction results
    /// into per-group arrays in original order.
    ///
    /// Fails closed on any length disagreement; a response that does
    /// not line up with the request is a protocol violation, never
    /// truncated or padded.
    pub fn unflatten<T>(&self, mut flat: Vec<T>) -> Result<Vec<Vec<T>>> {
        if flat.len() != self.len() {
            return Err(WalletError::ResponseLengthMismatch {
                got: flat.len(),
                expected: self.len(),
            });
        }
        let mut grouped = Vec::with_capacity(self.groups.len());
        let mut rest = flat.drain(..);
        for group in &self.groups {
            grouped.push(rest.by_ref().take(group.len()).collect());
        }
        Ok(grouped)
    }
}
