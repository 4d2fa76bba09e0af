//! Error taxonomy for the assurance-contract engine.
//!
//! Every operation returns an explicit [`CoreError`]; nothing in this crate
//! retries, logs or panics on bad input. Callers decide whether to skip, retry
//! or abort.

use thiserror::Error;

use crate::types::{ContentId, OutPoint};

/// Failure reported by a [`SigningLedger`](crate::ledger::SigningLedger)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LedgerError(pub String);

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed construction input: empty title, zero goal, bad address,
    /// unrecognised image signature, structurally empty pledge.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Pledge targets project {actual}, contract is for {expected}")]
    WrongProject {
        expected: ContentId,
        actual: ContentId,
    },

    #[error("Input {outpoint} is already claimed by pledge {existing}")]
    DuplicateInput {
        outpoint: OutPoint,
        existing: ContentId,
    },

    #[error("Input {index} has no authorization")]
    UnsignedInput { index: usize },

    #[error("Funding goal not reached: {pledged}/{goal}")]
    GoalNotReached { pledged: u64, goal: u64 },

    #[error("Pledge {0} not found")]
    NotFound(ContentId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
