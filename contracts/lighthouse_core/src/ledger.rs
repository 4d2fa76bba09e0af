//! The ledger capability the engine consumes.
//!
//! Script construction, signing and transaction encoding are owned by the
//! ledger implementation. The engine only sees opaque [`Script`] bytes and
//! authorization proofs.

use crate::errors::LedgerError;
use crate::types::{Script, Transaction, TxId};

pub trait SigningLedger {
    /// Key material accepted by [`SigningLedger::produce_authorization`].
    type PrivateKey;

    /// Network label written into project files (e.g. `"main"`).
    fn network(&self) -> &str;

    /// Decode a human-readable address into the locking script it denotes.
    fn decode_address(&self, address: &str) -> Result<Script, LedgerError>;

    fn build_locking_script(&self, pub_key_hash: &[u8; 20]) -> Script;

    /// Produce the unlocking proof for input `input_index` of `tx`.
    ///
    /// With `detachable` set, the proof must stay valid when further inputs are
    /// appended to the transaction later on.
    fn produce_authorization(
        &self,
        key: &Self::PrivateKey,
        tx: &Transaction,
        input_index: usize,
        detachable: bool,
    ) -> Result<Script, LedgerError>;

    fn transaction_id(&self, tx: &Transaction) -> TxId;

    fn serialize_transaction(&self, tx: &Transaction) -> Vec<u8>;
}
