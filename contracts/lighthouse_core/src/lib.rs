//! # Lighthouse Core
//!
//! Pledge-aggregation and combination engine for assurance contracts on a
//! UTXO ledger: contributors sign partial transactions that only become a
//! valid spend once enough of them accumulate to meet a funding goal.
//!
//! | Stage       | Entry Point(s)                                              |
//! |-------------|-------------------------------------------------------------|
//! | Define      | [`ProjectSpec::create`], [`ProjectSpec::load`]              |
//! | Contribute  | [`PledgeBuilder::create`], [`PledgeBuilder::sign`]          |
//! | Exchange    | [`Pledge::load`], [`Pledge::serialize`], [`Pledge::validate`] |
//! | Aggregate   | [`Contract::add_pledge`], [`Contract::remove_pledge`]       |
//! | Claim       | [`Contract::combine`]                                       |
//! | Report      | [`Contract::status`]                                        |
//!
//! ## Architecture
//!
//! Script construction, signing and transaction encoding are delegated to a
//! [`SigningLedger`]. File encoding lives in [`wire`]. All calls are
//! synchronous and pure: bytes go in and come out, no I/O happens here and
//! nothing is logged.

mod contract;
mod errors;
mod ledger;
mod pledge;
mod project;
mod types;
pub mod wire;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

#[cfg(test)]
mod test_contract;
#[cfg(test)]
mod test_pledge;

pub use contract::{Contract, ContractState, ContractStatus, SurplusPolicy, SurplusToFirstOutput};
pub use errors::{CoreError, LedgerError, Result};
pub use ledger::SigningLedger;
pub use pledge::{scale_outputs, Pledge, PledgeBuilder};
pub use project::{ProjectSpec, DEFAULT_MIN_PLEDGE_AMOUNT, PROJECT_VERSION};
pub use types::{
    Contact, ContentId, OutPoint, PledgeId, ProjectId, Script, Transaction, TxId, TxIn, TxOut,
    Utxo, FINAL_SEQUENCE, TX_VERSION,
};
