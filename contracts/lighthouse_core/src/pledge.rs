//! # Pledges
//!
//! A [`Pledge`] is one contributor's partial transaction: a set of signed
//! inputs plus outputs paying the project's destinations in proportion to the
//! contributed amount. Contributors build pledges independently with a
//! [`PledgeBuilder`]; nothing about the final claim transaction needs to be
//! agreed in advance because every input is signed with a detachable
//! authorization.
//!
//! Like [`ProjectSpec`], a pledge is a value object: signing and metadata
//! changes return a new pledge with a recomputed id.

use chrono::{DateTime, Utc};
use prost::Message;

use crate::errors::{CoreError, Result};
use crate::ledger::SigningLedger;
use crate::project::ProjectSpec;
use crate::types::{
    Contact, OutPoint, PledgeId, ProjectId, Script, Transaction, TxId, TxIn, TxOut, Utxo,
    FINAL_SEQUENCE,
};
use crate::wire;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pledge {
    id: PledgeId,
    project_id: ProjectId,
    amount: u64,
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
    memo: Option<String>,
    refund_address: Option<String>,
    contact: Option<Contact>,
    created_at: i64,
}

impl Pledge {
    /// Decode a pledge file and recompute its id.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let msg = wire::Pledge::decode(bytes)?;
        Self::from_wire(msg)
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.to_wire().encode_to_vec()
    }

    /// Structural checks: at least one input and one output, every input
    /// authorized, and tracked input value covering the pledged amount.
    ///
    /// Whether the inputs are still unspent is not checked here; callers must
    /// verify that against the ledger before trusting a funded contract.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(CoreError::Validation("pledge has no inputs".into()));
        }
        if self.outputs.is_empty() {
            return Err(CoreError::Validation("pledge has no outputs".into()));
        }
        if let Some(index) = self.inputs.iter().position(|i| !i.is_signed()) {
            return Err(CoreError::UnsignedInput { index });
        }
        let available = self.input_value();
        if available < self.amount {
            return Err(CoreError::Validation(format!(
                "inputs carry {available}, pledge claims {}",
                self.amount
            )));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Copy-on-write metadata
    // ─────────────────────────────────────────────────────────

    /// Message from the contributor to the project owner.
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self.sealed()
    }

    /// Where the contributor wants funds returned if the project fails.
    pub fn with_refund_address(mut self, address: impl Into<String>) -> Self {
        self.refund_address = Some(address.into());
        self.sealed()
    }

    pub fn with_contact(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.contact = Some(Contact {
            name: name.into(),
            email: email.into(),
        });
        self.sealed()
    }

    // ─────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────

    pub fn id(&self) -> PledgeId {
        self.id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn inputs(&self) -> &[TxIn] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn refund_address(&self) -> Option<&str> {
        self.refund_address.as_deref()
    }

    pub fn contact(&self) -> Option<&Contact> {
        self.contact.as_ref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    pub fn outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs.iter().map(|i| i.outpoint)
    }

    /// Sum of the values of the spent outputs, as tracked by the builder.
    pub fn input_value(&self) -> u64 {
        self.inputs
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.source.amount))
    }

    pub fn is_signed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(TxIn::is_signed)
    }

    /// The partial transaction this pledge authorizes.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.inputs.clone(), self.outputs.clone())
    }

    // ─────────────────────────────────────────────────────────
    // Encoding
    // ─────────────────────────────────────────────────────────

    fn sealed(mut self) -> Self {
        self.id = PledgeId::of(&self.serialize());
        self
    }

    fn to_wire(&self) -> wire::Pledge {
        wire::Pledge {
            project_id: self.project_id.as_bytes().to_vec(),
            inputs: self
                .inputs
                .iter()
                .map(|i| wire::Input {
                    tx_hash: i.outpoint.txid.as_bytes().to_vec(),
                    output_index: i.outpoint.index,
                    unlock_script: i.unlock_script.0.clone(),
                    sequence: i.sequence,
                    value: i.source.amount,
                    prev_script: i.source.script.0.clone(),
                })
                .collect(),
            contact: self.contact.as_ref().map(|c| wire::ContactInfo {
                name: c.name.clone(),
                email: c.email.clone(),
            }),
            memo: self.memo.clone(),
            created_at: self.created_at,
            refund_address: self.refund_address.clone(),
            amount: self.amount,
            outputs: self
                .outputs
                .iter()
                .map(|o| wire::Output {
                    amount: o.amount,
                    script: o.script.0.clone(),
                })
                .collect(),
        }
    }

    fn from_wire(msg: wire::Pledge) -> Result<Self> {
        let project_id = ProjectId::from_bytes(&msg.project_id)?;

        let inputs = msg
            .inputs
            .into_iter()
            .map(|i| {
                Ok(TxIn {
                    outpoint: OutPoint::new(TxId::from_bytes(&i.tx_hash)?, i.output_index),
                    sequence: i.sequence,
                    unlock_script: Script(i.unlock_script),
                    source: TxOut::new(i.value, Script(i.prev_script)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pledge = Self {
            id: PledgeId::of(&[]),
            project_id,
            amount: msg.amount,
            inputs,
            outputs: msg
                .outputs
                .into_iter()
                .map(|o| TxOut::new(o.amount, Script(o.script)))
                .collect(),
            memo: msg.memo,
            refund_address: msg.refund_address,
            contact: msg.contact.map(|c| Contact {
                name: c.name,
                email: c.email,
            }),
            created_at: msg.created_at,
        };
        Ok(pledge.sealed())
    }
}

/// Scale a project's payouts to a contribution of `amount` out of `goal`.
///
/// Each output becomes `floor(payout * amount / goal)`, computed in 128-bit
/// integers. The truncated remainder is not redistributed here; the claim
/// transaction pays the project's own outputs and absorbs it. A `goal` of zero
/// scales every output to zero.
pub fn scale_outputs(payouts: &[TxOut], amount: u64, goal: u64) -> Vec<TxOut> {
    payouts
        .iter()
        .map(|payout| {
            let scaled = (u128::from(payout.amount) * u128::from(amount))
                .checked_div(u128::from(goal))
                .unwrap_or(0);
            TxOut::new(
                u64::try_from(scaled).unwrap_or(u64::MAX),
                payout.script.clone(),
            )
        })
        .collect()
}

/// Builds and signs pledges for one project.
pub struct PledgeBuilder<'a> {
    project: &'a ProjectSpec,
    sequence: u32,
}

impl<'a> PledgeBuilder<'a> {
    pub fn new(project: &'a ProjectSpec) -> Self {
        Self {
            project,
            sequence: FINAL_SEQUENCE,
        }
    }

    /// Sequence number written into every selected input.
    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Build an unsigned pledge of `amount`.
    ///
    /// Inputs are taken first-fit in the order given until their value reaches
    /// `amount`; no attempt is made to minimise change.
    pub fn create(&self, amount: u64, available_inputs: &[Utxo]) -> Result<Pledge> {
        let minimum = self.project.min_pledge_amount();
        if amount < minimum {
            return Err(CoreError::Validation(format!(
                "pledge amount {amount} is less than minimum {minimum}"
            )));
        }

        let mut selected = Vec::new();
        let mut total = 0u64;
        for utxo in available_inputs {
            if total >= amount {
                break;
            }
            total = total.saturating_add(utxo.output.amount);
            selected.push(utxo.to_input(self.sequence));
        }

        if total < amount {
            return Err(CoreError::InsufficientFunds {
                required: amount,
                available: total,
            });
        }

        let pledge = Pledge {
            id: PledgeId::of(&[]),
            project_id: self.project.id(),
            amount,
            inputs: selected,
            outputs: scale_outputs(self.project.outputs(), amount, self.project.goal_amount()),
            memo: None,
            refund_address: None,
            contact: None,
            created_at: Utc::now().timestamp(),
        };
        Ok(pledge.sealed())
    }

    /// Authorize every input of `pledge`, input `i` with `keys[i]`.
    ///
    /// Signatures are detachable: they stay valid once the pledge's inputs are
    /// merged with other contributors' into the claim transaction.
    pub fn sign<L: SigningLedger>(
        &self,
        ledger: &L,
        mut pledge: Pledge,
        keys: &[L::PrivateKey],
    ) -> Result<Pledge> {
        if pledge.project_id != self.project.id() {
            return Err(CoreError::WrongProject {
                expected: self.project.id(),
                actual: pledge.project_id,
            });
        }
        if pledge.inputs.len() > keys.len() {
            return Err(CoreError::UnsignedInput { index: keys.len() });
        }

        let unsigned = pledge.transaction();
        for (index, (input, key)) in pledge.inputs.iter_mut().zip(keys).enumerate() {
            input.unlock_script = ledger.produce_authorization(key, &unsigned, index, true)?;
        }
        Ok(pledge.sealed())
    }
}
