//! Concrete [`SigningLedger`] for Bitcoin SV.
//!
//! Addresses are Base58Check P2PKH, transactions use the standard wire format
//! and inputs are signed with a FORKID signature hash. Detachable
//! authorizations add `ANYONECANPAY`, so a pledge signature commits to its own
//! input and to every output of the transaction it signs (the pledge's scaled
//! outputs), but not to any other input.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use lighthouse_core::{LedgerError, Pledge, PledgeId, Script, SigningLedger, Transaction, TxId};
use sha2::{Digest, Sha256};

use crate::errors::CoordinatorError;

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_FORKID: u8 = 0x40;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_PUSHDATA1: u8 = 0x4c;

const REVOCATION_TAG: &[u8] = b"lighthouse/revoke/v1:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Main,
    Test,
}

impl Network {
    /// Base58Check version byte of P2PKH addresses.
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Self::Main => 0x00,
            Self::Test => 0x6f,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "mainnet" => Ok(Self::Main),
            "test" | "testnet" => Ok(Self::Test),
            other => Err(CoordinatorError::Config(format!("Invalid NETWORK: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BsvLedger {
    network: Network,
}

impl BsvLedger {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    /// Encode a P2PKH address for `pub_key_hash` on this ledger's network.
    pub fn encode_address(&self, pub_key_hash: &[u8; 20]) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.network.p2pkh_version());
        payload.extend_from_slice(pub_key_hash);
        bs58::encode(payload).with_check().into_string()
    }

    /// FORKID signature hash of input `input_index` under `sighash_type`.
    ///
    /// Only the `ALL` base type is produced; `ANYONECANPAY` blanks the
    /// previous-output and sequence commitments.
    pub fn signature_hash(
        tx: &Transaction,
        input_index: usize,
        sighash_type: u8,
    ) -> Result<[u8; 32], LedgerError> {
        let input = tx
            .inputs
            .get(input_index)
            .ok_or_else(|| LedgerError(format!("input {input_index} out of range")))?;
        let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;

        let (hash_prevouts, hash_sequence) = if anyone_can_pay {
            ([0u8; 32], [0u8; 32])
        } else {
            let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
            let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
            for i in &tx.inputs {
                prevouts.extend_from_slice(i.outpoint.txid.as_bytes());
                prevouts.extend_from_slice(&i.outpoint.index.to_le_bytes());
                sequences.extend_from_slice(&i.sequence.to_le_bytes());
            }
            (sha256d(&prevouts), sha256d(&sequences))
        };

        let mut outputs = Vec::new();
        for o in &tx.outputs {
            outputs.extend_from_slice(&o.amount.to_le_bytes());
            write_var_bytes(&mut outputs, o.script.as_bytes());
        }
        let hash_outputs = sha256d(&outputs);

        let mut preimage = Vec::with_capacity(160 + input.source.script.len());
        preimage.extend_from_slice(&tx.version.to_le_bytes());
        preimage.extend_from_slice(&hash_prevouts);
        preimage.extend_from_slice(&hash_sequence);
        preimage.extend_from_slice(input.outpoint.txid.as_bytes());
        preimage.extend_from_slice(&input.outpoint.index.to_le_bytes());
        write_var_bytes(&mut preimage, input.source.script.as_bytes());
        preimage.extend_from_slice(&input.source.amount.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
        preimage.extend_from_slice(&hash_outputs);
        preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
        preimage.extend_from_slice(&u32::from(sighash_type).to_le_bytes());

        Ok(sha256d(&preimage))
    }
}

impl SigningLedger for BsvLedger {
    type PrivateKey = SigningKey;

    fn network(&self) -> &str {
        self.network.as_str()
    }

    fn decode_address(&self, address: &str) -> Result<Script, LedgerError> {
        let payload = bs58::decode(address)
            .with_check(None)
            .into_vec()
            .map_err(|e| LedgerError(format!("bad base58check: {e}")))?;
        let (version, hash) = payload
            .split_first()
            .ok_or_else(|| LedgerError("empty address payload".into()))?;
        if *version != self.network.p2pkh_version() {
            return Err(LedgerError(format!(
                "address version {version:#04x} is not P2PKH on {}",
                self.network
            )));
        }
        let hash: [u8; 20] = hash
            .try_into()
            .map_err(|_| LedgerError(format!("address hash must be 20 bytes, got {}", hash.len())))?;
        Ok(self.build_locking_script(&hash))
    }

    fn build_locking_script(&self, pub_key_hash: &[u8; 20]) -> Script {
        let mut script = Vec::with_capacity(25);
        script.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
        script.extend_from_slice(pub_key_hash);
        script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Script(script)
    }

    fn produce_authorization(
        &self,
        key: &SigningKey,
        tx: &Transaction,
        input_index: usize,
        detachable: bool,
    ) -> Result<Script, LedgerError> {
        let mut sighash_type = SIGHASH_ALL | SIGHASH_FORKID;
        if detachable {
            sighash_type |= SIGHASH_ANYONECANPAY;
        }
        let digest = Self::signature_hash(tx, input_index, sighash_type)?;

        let signature = PrehashSigner::<Signature>::sign_prehash(key, &digest)
            .map_err(|e| LedgerError(format!("signing failed: {e}")))?;
        let signature = signature.normalize_s().unwrap_or(signature);

        let mut sig_bytes = signature.to_der().as_bytes().to_vec();
        sig_bytes.push(sighash_type);
        let pub_key = key.verifying_key().to_encoded_point(true);

        let mut script = Vec::with_capacity(sig_bytes.len() + pub_key.len() + 2);
        push_data(&mut script, &sig_bytes);
        push_data(&mut script, pub_key.as_bytes());
        Ok(Script(script))
    }

    fn transaction_id(&self, tx: &Transaction) -> TxId {
        TxId(sha256d(&self.serialize_transaction(tx)))
    }

    fn serialize_transaction(&self, tx: &Transaction) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&tx.version.to_le_bytes());
        write_compact_size(&mut out, tx.inputs.len() as u64);
        for input in &tx.inputs {
            out.extend_from_slice(input.outpoint.txid.as_bytes());
            out.extend_from_slice(&input.outpoint.index.to_le_bytes());
            write_var_bytes(&mut out, input.unlock_script.as_bytes());
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_compact_size(&mut out, tx.outputs.len() as u64);
        for output in &tx.outputs {
            out.extend_from_slice(&output.amount.to_le_bytes());
            write_var_bytes(&mut out, output.script.as_bytes());
        }
        out.extend_from_slice(&tx.lock_time.to_le_bytes());
        out
    }
}

// ─────────────────────────────────────────────────────────
// Revocation proofs
// ─────────────────────────────────────────────────────────

/// Digest a contributor signs to withdraw `pledge_id`.
pub fn revocation_digest(pledge_id: &PledgeId) -> [u8; 32] {
    let mut message = REVOCATION_TAG.to_vec();
    message.extend_from_slice(pledge_id.as_bytes());
    sha256d(&message)
}

/// DER signature over [`revocation_digest`] with one of the pledge's input keys.
pub fn sign_revocation(key: &SigningKey, pledge_id: &PledgeId) -> Result<Vec<u8>, LedgerError> {
    let signature = PrehashSigner::<Signature>::sign_prehash(key, &revocation_digest(pledge_id))
        .map_err(|e| LedgerError(format!("signing failed: {e}")))?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Accept `signature` only if it was made by a key that validly signed one of
/// the pledge's inputs.
pub fn verify_revocation(pledge: &Pledge, signature: &[u8]) -> Result<(), LedgerError> {
    let signature = Signature::from_der(signature)
        .map_err(|_| LedgerError("revocation signature is not DER".into()))?;
    let digest = revocation_digest(&pledge.id());
    let tx = pledge.transaction();

    let owned = (0..tx.inputs.len())
        .filter_map(|index| authorizing_key(&tx, index))
        .any(|key| key.verify_prehash(&digest, &signature).is_ok());
    if owned {
        Ok(())
    } else {
        Err(LedgerError(format!(
            "revocation of {} is not signed by any of its input keys",
            pledge.id()
        )))
    }
}

/// Public key of a `<sig> <pubkey>` unlock script, if its signature verifies
/// for that input.
fn authorizing_key(tx: &Transaction, index: usize) -> Option<VerifyingKey> {
    let pushes = parse_pushes(tx.inputs.get(index)?.unlock_script.as_bytes())?;
    let [sig, key] = pushes.as_slice() else {
        return None;
    };
    let (sighash_type, der) = sig.split_last()?;
    let key = VerifyingKey::from_sec1_bytes(key).ok()?;
    let signature = Signature::from_der(der).ok()?;
    let digest = BsvLedger::signature_hash(tx, index, *sighash_type).ok()?;
    key.verify_prehash(&digest, &signature).ok()?;
    Some(key)
}

/// Split a push-only script into its pushed items.
fn parse_pushes(script: &[u8]) -> Option<Vec<&[u8]>> {
    let mut pushes = Vec::new();
    let mut rest = script;
    while let Some((&op, tail)) = rest.split_first() {
        let (len, tail) = match op {
            0x01..=0x4b => (op as usize, tail),
            OP_PUSHDATA1 => {
                let (&len, tail) = tail.split_first()?;
                (len as usize, tail)
            }
            _ => return None,
        };
        if tail.len() < len {
            return None;
        }
        let (data, tail) = tail.split_at(len);
        pushes.push(data);
        rest = tail;
    }
    Some(pushes)
}

// ─────────────────────────────────────────────────────────
// Encoding helpers
// ─────────────────────────────────────────────────────────

pub fn sha256d(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(bytes)).into()
}

pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

fn write_var_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Script push of `data`. Covers every length a signature or key can have.
fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    if data.len() < OP_PUSHDATA1 as usize {
        script.push(data.len() as u8);
    } else {
        script.push(OP_PUSHDATA1);
        script.push(data.len() as u8);
    }
    script.extend_from_slice(data);
}
