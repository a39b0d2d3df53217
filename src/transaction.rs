//! Transaction payload model and canonical encoding
//!
//! Transactions are encoded with a deterministic binary codec; the
//! transaction id is a domain-separated SHA-512/256 digest of that
//! encoding, and the group id is the digest of the ordered encodings
//! of one group with the group tag cleared. Field-level fidelity to
//! any particular chain stops at what round-trip identity needs.

use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};
use std::fmt;
use std::str::FromStr;

/// Domain prefix for transaction ids
const TXID_PREFIX: &[u8] = b"TX";
/// Domain prefix for group ids
const GROUP_PREFIX: &[u8] = b"TG";

/// A 32-byte account address, rendered as base58.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The zero address, used as a placeholder receiver in demos.
    pub const ZERO: Address = Address([0u8; 32]);
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| WalletError::Endpoint(format!("invalid address '{}': {}", s, e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WalletError::Endpoint(format!("invalid address length: {}", s)))?;
        Ok(Address(bytes))
    }
}

/// Transaction identifier: SHA-512/256 over the prefixed unsigned encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl FromStr for TxId {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| WalletError::Endpoint(format!("invalid txid '{}': {}", s, e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| WalletError::Endpoint(format!("invalid txid length: {}", s)))?;
        Ok(TxId(bytes))
    }
}

/// Atomic-group identifier shared by every transaction in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub [u8; 32]);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

/// Sequencing and fee parameters fetched fresh from the node before
/// every batch construction.
#[derive(Debug, Clone)]
pub struct SuggestedParams {
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
}

/// One unsigned transaction.
///
/// Optional fields cover the shapes the scenario builders need:
/// asset transfers, close-outs, rekeys, and application calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub receiver: Address,
    pub amount: u64,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub note: Vec<u8>,
    pub asset_id: Option<u64>,
    pub close_to: Option<Address>,
    pub rekey_to: Option<Address>,
    pub app_id: Option<u64>,
    pub app_args: Vec<Vec<u8>>,
    /// Group membership tag, assigned before request dispatch
    pub group: Option<GroupId>,
}

impl Transaction {
    /// Payment transaction
    pub fn payment(
        params: &SuggestedParams,
        sender: Address,
        receiver: Address,
        amount: u64,
        note: &[u8],
    ) -> Self {
        Self {
            sender,
            receiver,
            amount,
            fee: params.fee,
            first_valid: params.first_valid,
            last_valid: params.last_valid,
            genesis_id: params.genesis_id.clone(),
            note: note.to_vec(),
            asset_id: None,
            close_to: None,
            rekey_to: None,
            app_id: None,
            app_args: Vec::new(),
            group: None,
        }
    }

    /// Asset transfer transaction; amount 0 to self is an opt-in.
    pub fn asset_transfer(
        params: &SuggestedParams,
        sender: Address,
        receiver: Address,
        asset_id: u64,
        amount: u64,
        note: &[u8],
    ) -> Self {
        let mut txn = Self::payment(params, sender, receiver, amount, note);
        txn.asset_id = Some(asset_id);
        txn
    }

    /// Application call carrying the given arguments.
    pub fn app_call(
        params: &SuggestedParams,
        sender: Address,
        app_id: u64,
        app_args: Vec<Vec<u8>>,
        note: &[u8],
    ) -> Self {
        let mut txn = Self::payment(params, sender, Address::ZERO, 0, note);
        txn.app_id = Some(app_id);
        txn.app_args = app_args;
        txn
    }

    /// Canonical binary encoding of the unsigned transaction.
    pub fn encode_unsigned(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode an unsigned transaction from its canonical encoding.
    pub fn decode_unsigned(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Transaction id over the canonical encoding (group tag included).
    pub fn id(&self) -> Result<TxId> {
        let encoded = self.encode_unsigned()?;
        let mut hasher = Sha512_256::new();
        hasher.update(TXID_PREFIX);
        hasher.update(&encoded);
        Ok(TxId(hasher.finalize().into()))
    }
}

/// Deterministic group id over the ordered transactions of one group.
///
/// Each transaction is hashed with its own group tag cleared, so
/// assignment is idempotent: recomputing over already-tagged
/// transactions yields the same id.
pub fn compute_group_id(txns: &[Transaction]) -> Result<GroupId> {
    let mut hasher = Sha512_256::new();
    hasher.update(GROUP_PREFIX);
    for txn in txns {
        let mut untagged = txn.clone();
        untagged.group = None;
        hasher.update(untagged.encode_unsigned()?);
    }
    Ok(GroupId(hasher.finalize().into()))
}

/// A signed transaction blob as returned by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub txn: Transaction,
    /// Raw signature bytes; empty means the wallet produced no signature
    pub sig: Vec<u8>,
    /// Set when the signing key differs from the sender (rekeyed authority)
    pub auth_addr: Option<Address>,
}

impl SignedTransaction {
    /// Canonical binary encoding of the signed transaction.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a signed transaction from its canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SuggestedParams {
        SuggestedParams {
            fee: 1000,
            first_valid: 5000,
            last_valid: 6000,
            genesis_id: "testnet-v1.0".to_string(),
        }
    }

    fn addr(byte: u8) -> Address {
        Address([byte; 32])
    }

    #[test]
    fn test_txid_round_trip() {
        let txn = Transaction::payment(&params(), addr(1), addr(2), 100_000, b"note");
        let encoded = txn.encode_unsigned().unwrap();
        let decoded = Transaction::decode_unsigned(&encoded).unwrap();
        assert_eq!(txn, decoded);
        assert_eq!(txn.id().unwrap(), decoded.id().unwrap());
    }

    #[test]
    fn test_group_id_idempotent() {
        let p = params();
        let mut txns = vec![
            Transaction::payment(&p, addr(1), addr(2), 1, b"a"),
            Transaction::payment(&p, addr(2), addr(1), 2, b"b"),
        ];
        let gid = compute_group_id(&txns).unwrap();

        // Tagging the transactions must not change the computed id
        for txn in &mut txns {
            txn.group = Some(gid);
        }
        assert_eq!(compute_group_id(&txns).unwrap(), gid);
    }

    #[test]
    fn test_group_id_order_sensitive() {
        let p = params();
        let a = Transaction::payment(&p, addr(1), addr(2), 1, b"a");
        let b = Transaction::payment(&p, addr(2), addr(1), 2, b"b");

        let forward = compute_group_id(&[a.clone(), b.clone()]).unwrap();
        let reversed = compute_group_id(&[b, a]).unwrap();
        assert_ne!(forward, reversed);
    }

    #[test]
    fn test_group_tag_changes_txid() {
        let p = params();
        let mut txn = Transaction::payment(&p, addr(1), addr(2), 1, b"a");
        let bare = txn.id().unwrap();
        txn.group = Some(GroupId([7u8; 32]));
        assert_ne!(txn.id().unwrap(), bare);
    }

    #[test]
    fn test_address_display_round_trip() {
        let a = addr(42);
        let s = a.to_string();
        assert_eq!(s.parse::<Address>().unwrap(), a);
    }
}
