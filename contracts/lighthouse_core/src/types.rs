//! # Types
//!
//! Value types shared by every module of the engine.
//!
//! ## Identifiers
//!
//! [`ContentId`] is the SHA-256 digest of an entity's canonical encoding.
//! Projects and pledges are both identified this way ([`ProjectId`],
//! [`PledgeId`]), so an identifier can never describe content other than the
//! bytes it was computed from.
//!
//! [`TxId`] is a ledger transaction hash. It is stored in internal byte order
//! and displayed reversed, the way block explorers print it.
//!
//! ## Transactions
//!
//! The engine never serializes or signs a [`Transaction`] itself; it only
//! assembles inputs and outputs and hands the result to a
//! [`SigningLedger`](crate::ledger::SigningLedger). Each [`TxIn`] carries the
//! output it spends (`source`) because the builder tracks input values and
//! detachable signatures commit to the spent amount.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::CoreError;

/// Default transaction version for assembled transactions.
pub const TX_VERSION: u32 = 1;

/// Sequence number for inputs that opt out of replacement.
pub const FINAL_SEQUENCE: u32 = 0xffff_ffff;

// ─────────────────────────────────────────────────────────
// Content identifiers
// ─────────────────────────────────────────────────────────

/// SHA-256 digest of an entity's canonical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId([u8; 32]);

pub type ProjectId = ContentId;
pub type PledgeId = ContentId;

impl ContentId {
    /// Hash `bytes` into an identifier.
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::Serialization(format!("identifier must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.to_hex())
    }
}

impl FromStr for ContentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)
            .map_err(|e| CoreError::Validation(format!("invalid identifier {s:?}: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────
// Ledger primitives
// ─────────────────────────────────────────────────────────

/// Transaction hash in internal byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::Serialization(format!("tx hash must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(raw))
    }

    /// Parse the reversed hex form printed by explorers.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let mut bytes = hex::decode(s)
            .map_err(|e| CoreError::Validation(format!("invalid txid {s:?}: {e}")))?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(reversed))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({self})")
    }
}

/// A spendable coin: output `index` of transaction `txid`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: TxId,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// Opaque locking or unlocking script bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// A transaction output: `amount` in the smallest ledger unit locked by `script`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub amount: u64,
    pub script: Script,
}

impl TxOut {
    pub fn new(amount: u64, script: Script) -> Self {
        Self { amount, script }
    }
}

/// A transaction input together with the output it spends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub outpoint: OutPoint,
    pub sequence: u32,
    /// Authorization proof; empty until signed.
    pub unlock_script: Script,
    /// The spent output, tracked by the builder and not re-verified from chain.
    pub source: TxOut,
}

impl TxIn {
    pub fn is_signed(&self) -> bool {
        !self.unlock_script.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Sum of the tracked values of every input. Saturates rather than wraps.
    pub fn input_value(&self) -> u64 {
        self.inputs
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.source.amount))
    }

    pub fn output_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.amount))
    }
}

/// A coin the contributor can spend into a pledge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub output: TxOut,
}

impl Utxo {
    pub fn new(txid: TxId, index: u32, amount: u64, script: Script) -> Self {
        Self {
            outpoint: OutPoint::new(txid, index),
            output: TxOut::new(amount, script),
        }
    }

    /// An unsigned input spending this coin.
    pub fn to_input(&self, sequence: u32) -> TxIn {
        TxIn {
            outpoint: self.outpoint,
            sequence,
            unlock_script: Script::default(),
            source: self.output.clone(),
        }
    }
}

/// Optional contributor contact details attached to a pledge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
}
