//! Deterministic stand-ins for tests: a [`MockLedger`] that "signs" by hashing
//! and helpers for fabricating coins.

use sha2::{Digest, Sha256};

use crate::errors::LedgerError;
use crate::ledger::SigningLedger;
use crate::types::{Script, Transaction, TxId, Utxo};

/// Address accepted by [`MockLedger::decode_address`].
pub const MOCK_ADDRESS: &str = "mockPayoutAddress1";

/// Flag byte prefixed to detachable mock authorizations.
pub const DETACHABLE_FLAG: u8 = 0xC1;
const ATTACHED_FLAG: u8 = 0x41;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockKey(pub u8);

/// In-memory ledger whose scripts and proofs are content hashes.
///
/// Addresses must be non-empty ASCII alphanumerics not starting with
/// `invalid`. Authorizations commit to the signed input and the outputs only,
/// so appending inputs leaves them intact, mirroring a detachable signature.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockLedger;

impl SigningLedger for MockLedger {
    type PrivateKey = MockKey;

    fn network(&self) -> &str {
        "mock"
    }

    fn decode_address(&self, address: &str) -> Result<Script, LedgerError> {
        if address.is_empty()
            || address.starts_with("invalid")
            || !address.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(LedgerError(format!("cannot decode address {address:?}")));
        }
        let hash: [u8; 20] = Sha256::digest(address.as_bytes())[..20]
            .try_into()
            .map_err(|_| LedgerError("short digest".into()))?;
        Ok(self.build_locking_script(&hash))
    }

    fn build_locking_script(&self, pub_key_hash: &[u8; 20]) -> Script {
        let mut script = vec![0x76, 0xa9, 0x14];
        script.extend_from_slice(pub_key_hash);
        script.extend_from_slice(&[0x88, 0xac]);
        Script(script)
    }

    fn produce_authorization(
        &self,
        key: &MockKey,
        tx: &Transaction,
        input_index: usize,
        detachable: bool,
    ) -> Result<Script, LedgerError> {
        let input = tx
            .inputs
            .get(input_index)
            .ok_or_else(|| LedgerError(format!("no input {input_index}")))?;
        let flag = if detachable { DETACHABLE_FLAG } else { ATTACHED_FLAG };

        let mut hasher = Sha256::new();
        hasher.update([key.0, flag]);
        hasher.update(input.outpoint.txid.as_bytes());
        hasher.update(input.outpoint.index.to_le_bytes());
        hasher.update(input.source.amount.to_le_bytes());
        if !detachable {
            for other in &tx.inputs {
                hasher.update(other.outpoint.txid.as_bytes());
            }
        }
        for output in &tx.outputs {
            hasher.update(output.amount.to_le_bytes());
            hasher.update(output.script.as_bytes());
        }

        let mut proof = vec![flag];
        proof.extend_from_slice(&hasher.finalize());
        Ok(Script(proof))
    }

    fn transaction_id(&self, tx: &Transaction) -> TxId {
        TxId(Sha256::digest(self.serialize_transaction(tx)).into())
    }

    fn serialize_transaction(&self, tx: &Transaction) -> Vec<u8> {
        let mut out = tx.version.to_le_bytes().to_vec();
        for input in &tx.inputs {
            out.extend_from_slice(input.outpoint.txid.as_bytes());
            out.extend_from_slice(&input.outpoint.index.to_le_bytes());
            out.extend_from_slice(input.unlock_script.as_bytes());
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        for output in &tx.outputs {
            out.extend_from_slice(&output.amount.to_le_bytes());
            out.extend_from_slice(output.script.as_bytes());
        }
        out.extend_from_slice(&tx.lock_time.to_le_bytes());
        out
    }
}

/// A transaction hash filled with `seed`.
pub fn txid(seed: u8) -> TxId {
    TxId([seed; 32])
}

/// A coin at output `index` of [`txid`]`(seed)` worth `amount`.
pub fn utxo(seed: u8, index: u32, amount: u64) -> Utxo {
    let script = MockLedger
        .decode_address(&format!("coin{seed}"))
        .unwrap_or_default();
    Utxo::new(txid(seed), index, amount, script)
}
