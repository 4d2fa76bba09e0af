//! # Assurance contract
//!
//! A [`Contract`] aggregates pledges for a single [`ProjectSpec`] and, once the
//! goal is met, combines them into the claim transaction.
//!
//! ## State machine
//!
//! ```text
//! Empty ──► Accumulating ──► Fundable ──► Combined
//!               ▲                │            │
//!               └── remove ──────┘            │
//!               ▲                             │
//!               └──── add / remove ───────────┘
//! ```
//!
//! Any mutation drops the cached combination, so [`Contract::combine`] can be
//! called again after further pledges arrive or are revoked.
//!
//! ## Trust boundary
//!
//! Duplicate-input detection only covers the pledges held by this instance.
//! Nothing here checks that an input is still unspent on the ledger; callers
//! must verify that independently before relying on [`Contract::can_claim`].
//!
//! A contract is a plain single-owner value: mutation needs `&mut self`, and a
//! contract shared between threads must sit behind a lock.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{CoreError, Result};
use crate::pledge::Pledge;
use crate::project::ProjectSpec;
use crate::types::{OutPoint, PledgeId, ProjectId, Transaction, TxOut};

/// Decides where value in excess of the payout outputs goes in a claim.
pub trait SurplusPolicy {
    /// Distribute `surplus` over `outputs`. Called only with `surplus > 0`.
    fn distribute(&self, outputs: &mut [TxOut], surplus: u64);
}

/// Adds the whole surplus to the first payout output.
#[derive(Clone, Copy, Debug, Default)]
pub struct SurplusToFirstOutput;

impl SurplusPolicy for SurplusToFirstOutput {
    fn distribute(&self, outputs: &mut [TxOut], surplus: u64) {
        if let Some(first) = outputs.first_mut() {
            first.amount = first.amount.saturating_add(surplus);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    /// No pledges accepted yet.
    Empty,
    /// Below the goal.
    Accumulating,
    /// Goal met; a claim can be built.
    Fundable,
    /// Claim transaction built and cached.
    Combined,
}

/// Read-only snapshot of a contract for reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContractStatus {
    pub project_id: ProjectId,
    pub goal_amount: u64,
    pub total_pledged: u64,
    pub pledge_count: usize,
    pub progress: f64,
    pub can_claim: bool,
    pub is_expired: bool,
    pub state: ContractState,
}

pub struct Contract<P: SurplusPolicy = SurplusToFirstOutput> {
    project: ProjectSpec,
    pledges: Vec<Pledge>,
    claimed: HashMap<OutPoint, PledgeId>,
    combined: Option<Transaction>,
    policy: P,
}

impl Contract<SurplusToFirstOutput> {
    pub fn new(project: ProjectSpec) -> Self {
        Self::with_policy(project, SurplusToFirstOutput)
    }
}

impl<P: SurplusPolicy> Contract<P> {
    pub fn with_policy(project: ProjectSpec, policy: P) -> Self {
        Self {
            project,
            pledges: Vec::new(),
            claimed: HashMap::new(),
            combined: None,
            policy,
        }
    }

    /// Accept `pledge` if it targets this project, is structurally valid, meets
    /// the project's minimum and spends no input already claimed by an
    /// accepted pledge.
    pub fn add_pledge(&mut self, pledge: Pledge) -> Result<()> {
        if pledge.project_id() != self.project.id() {
            return Err(CoreError::WrongProject {
                expected: self.project.id(),
                actual: pledge.project_id(),
            });
        }

        pledge.validate()?;

        let minimum = self.project.min_pledge_amount();
        if pledge.amount() < minimum {
            return Err(CoreError::Validation(format!(
                "pledge amount {} is less than minimum {minimum}",
                pledge.amount()
            )));
        }

        for outpoint in pledge.outpoints() {
            if let Some(existing) = self.claimed.get(&outpoint) {
                return Err(CoreError::DuplicateInput {
                    outpoint,
                    existing: *existing,
                });
            }
        }
        // A pledge spending the same coin twice is rejected as well.
        let mut own = HashSet::new();
        for outpoint in pledge.outpoints() {
            if !own.insert(outpoint) {
                return Err(CoreError::DuplicateInput {
                    outpoint,
                    existing: pledge.id(),
                });
            }
        }

        for outpoint in pledge.outpoints() {
            self.claimed.insert(outpoint, pledge.id());
        }
        self.pledges.push(pledge);
        self.combined = None;
        Ok(())
    }

    /// Drop the pledge with identifier `id` and any cached combination.
    pub fn remove_pledge(&mut self, id: PledgeId) -> Result<Pledge> {
        let position = self
            .pledges
            .iter()
            .position(|p| p.id() == id)
            .ok_or(CoreError::NotFound(id))?;

        let removed = self.pledges.remove(position);
        for outpoint in removed.outpoints() {
            self.claimed.remove(&outpoint);
        }
        self.combined = None;
        Ok(removed)
    }

    pub fn total_pledged(&self) -> u64 {
        self.pledges
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.amount()))
    }

    /// Percentage of the goal pledged so far; may exceed 100.
    pub fn progress(&self) -> f64 {
        self.total_pledged() as f64 / self.project.goal_amount() as f64 * 100.0
    }

    pub fn can_claim(&self) -> bool {
        self.total_pledged() >= self.project.goal_amount()
    }

    /// Build the claim transaction.
    ///
    /// Inputs are every accepted pledge's inputs in insertion order; outputs are
    /// the project's payouts, with any surplus input value handed to the
    /// [`SurplusPolicy`].
    pub fn combine(&mut self) -> Result<Transaction> {
        if !self.can_claim() {
            return Err(CoreError::GoalNotReached {
                pledged: self.total_pledged(),
                goal: self.project.goal_amount(),
            });
        }

        let inputs = self
            .pledges
            .iter()
            .flat_map(|p| p.inputs().iter().cloned())
            .collect();
        let mut tx = Transaction::new(inputs, self.project.outputs().to_vec());

        let surplus = tx.input_value().saturating_sub(tx.output_value());
        if surplus > 0 {
            self.policy.distribute(&mut tx.outputs, surplus);
        }

        self.combined = Some(tx.clone());
        Ok(tx)
    }

    /// Re-run structural validation over every accepted pledge.
    pub fn validate_pledges(&self) -> Result<()> {
        for (index, pledge) in self.pledges.iter().enumerate() {
            pledge.validate().map_err(|e| {
                CoreError::Validation(format!("pledge {index} ({}) invalid: {e}", pledge.id()))
            })?;
        }
        Ok(())
    }

    pub fn state(&self) -> ContractState {
        if self.combined.is_some() {
            ContractState::Combined
        } else if self.pledges.is_empty() {
            ContractState::Empty
        } else if self.can_claim() {
            ContractState::Fundable
        } else {
            ContractState::Accumulating
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> ContractStatus {
        ContractStatus {
            project_id: self.project.id(),
            goal_amount: self.project.goal_amount(),
            total_pledged: self.total_pledged(),
            pledge_count: self.pledges.len(),
            progress: self.progress(),
            can_claim: self.can_claim(),
            is_expired: self.project.is_expired(now),
            state: self.state(),
        }
    }

    pub fn project(&self) -> &ProjectSpec {
        &self.project
    }

    /// Accepted pledges in insertion order.
    pub fn pledges(&self) -> &[Pledge] {
        &self.pledges
    }

    /// The cached claim transaction, if [`Contract::combine`] has run since the
    /// last mutation.
    pub fn combined(&self) -> Option<&Transaction> {
        self.combined.as_ref()
    }
}
