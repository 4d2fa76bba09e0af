//! # Project specification
//!
//! A [`ProjectSpec`] describes one funding goal: who gets paid, how much, and
//! the metadata shown to contributors. It is a value object. Every `with_*`
//! method consumes the project and returns a new one whose [`ProjectSpec::id`] has
//! been recomputed from the canonical encoding, so a caller can never hold a
//! project whose identifier is stale.
//!
//! The goal is never stored independently: it is the sum of the payout
//! outputs, both at construction and when a file is loaded back.

use chrono::{DateTime, Utc};
use prost::Message;

use crate::errors::{CoreError, Result};
use crate::ledger::SigningLedger;
use crate::types::{ProjectId, Script, TxOut};
use crate::wire;

/// Minimum pledge used when a project does not set one (0.0001 of a coin).
pub const DEFAULT_MIN_PLEDGE_AMOUNT: u64 = 10_000;

/// Project file format version.
pub const PROJECT_VERSION: u32 = 1;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectSpec {
    id: ProjectId,
    version: u32,
    network: String,
    title: String,
    description: String,
    outputs: Vec<TxOut>,
    goal_amount: u64,
    created_at: i64,
    expires_at: Option<i64>,
    min_pledge_amount: Option<u64>,
    cover_image: Option<Vec<u8>>,
    auth_key: Option<Vec<u8>>,
    tags: Vec<String>,
}

impl ProjectSpec {
    /// Create a project paying the full `goal_amount` to `payout_address`.
    pub fn create<L: SigningLedger>(
        ledger: &L,
        title: &str,
        description: &str,
        goal_amount: u64,
        payout_address: &str,
    ) -> Result<Self> {
        if title.trim().is_empty() {
            return Err(CoreError::Validation("title is required".into()));
        }
        if description.trim().is_empty() {
            return Err(CoreError::Validation("description is required".into()));
        }
        if goal_amount == 0 {
            return Err(CoreError::Validation(
                "goal amount must be greater than 0".into(),
            ));
        }

        let script = ledger
            .decode_address(payout_address)
            .map_err(|e| CoreError::Validation(format!("invalid address: {e}")))?;

        let spec = Self {
            id: ProjectId::of(&[]),
            version: PROJECT_VERSION,
            network: ledger.network().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            outputs: vec![TxOut::new(goal_amount, script)],
            goal_amount,
            created_at: Utc::now().timestamp(),
            expires_at: None,
            min_pledge_amount: None,
            cover_image: None,
            auth_key: None,
            tags: Vec::new(),
        };
        Ok(spec.sealed())
    }

    /// Decode a project file. The goal and id are recomputed from content.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let msg = wire::Project::decode(bytes)?;
        Self::from_wire(msg)
    }

    /// Canonical encoding; identical content always yields identical bytes.
    pub fn serialize(&self) -> Vec<u8> {
        self.to_wire().encode_to_vec()
    }

    // ─────────────────────────────────────────────────────────
    // Copy-on-write metadata
    // ─────────────────────────────────────────────────────────

    /// Attach a cover image. Only JPEG and PNG signatures are accepted.
    pub fn with_cover_image(mut self, image: Vec<u8>) -> Result<Self> {
        if image.len() < 4 {
            return Err(CoreError::Validation("invalid image data".into()));
        }
        if !image.starts_with(&JPEG_MAGIC) && !image.starts_with(&PNG_MAGIC) {
            return Err(CoreError::Validation(
                "image must be JPEG or PNG format".into(),
            ));
        }
        self.cover_image = Some(image);
        Ok(self.sealed())
    }

    /// Public key of the owner, used to authenticate updates to the project.
    pub fn with_auth_key(mut self, pub_key: Vec<u8>) -> Self {
        self.auth_key = Some(pub_key);
        self.sealed()
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at.timestamp());
        self.sealed()
    }

    pub fn with_min_pledge_amount(mut self, amount: u64) -> Result<Self> {
        if amount == 0 {
            return Err(CoreError::Validation(
                "minimum pledge must be greater than 0".into(),
            ));
        }
        if amount > self.goal_amount {
            return Err(CoreError::Validation(format!(
                "minimum pledge {amount} exceeds goal {}",
                self.goal_amount
            )));
        }
        self.min_pledge_amount = Some(amount);
        Ok(self.sealed())
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.sealed()
    }

    // ─────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────

    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Payout destinations, in the order they will appear in the claim.
    pub fn outputs(&self) -> &[TxOut] {
        &self.outputs
    }

    pub fn goal_amount(&self) -> u64 {
        self.goal_amount
    }

    pub fn min_pledge_amount(&self) -> u64 {
        match self.min_pledge_amount {
            Some(amount) if amount > 0 => amount,
            _ => DEFAULT_MIN_PLEDGE_AMOUNT,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn cover_image(&self) -> Option<&[u8]> {
        self.cover_image.as_deref()
    }

    pub fn auth_key(&self) -> Option<&[u8]> {
        self.auth_key.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// `true` iff an expiry is set and `now` is after it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expiry| now > expiry)
    }

    // ─────────────────────────────────────────────────────────
    // Encoding
    // ─────────────────────────────────────────────────────────

    fn sealed(mut self) -> Self {
        self.id = ProjectId::of(&self.serialize());
        self
    }

    fn to_wire(&self) -> wire::Project {
        wire::Project {
            version: self.version,
            network: self.network.clone(),
            outputs: self
                .outputs
                .iter()
                .map(|o| wire::Output {
                    amount: o.amount,
                    script: o.script.0.clone(),
                })
                .collect(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            memo: self.description.clone(),
            title: self.title.clone(),
            cover_image: self.cover_image.clone(),
            auth_key: self.auth_key.clone(),
            min_pledge_amount: self.min_pledge_amount,
            tags: self.tags.clone(),
        }
    }

    fn from_wire(msg: wire::Project) -> Result<Self> {
        if msg.outputs.is_empty() {
            return Err(CoreError::Serialization("project has no outputs".into()));
        }

        let goal_amount = msg
            .outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.amount))
            .ok_or_else(|| CoreError::Serialization("project outputs overflow".into()))?;
        if goal_amount == 0 {
            return Err(CoreError::Serialization("project goal is zero".into()));
        }

        let spec = Self {
            id: ProjectId::of(&[]),
            version: msg.version,
            network: msg.network,
            title: msg.title,
            description: msg.memo,
            outputs: msg
                .outputs
                .into_iter()
                .map(|o| TxOut::new(o.amount, Script(o.script)))
                .collect(),
            goal_amount,
            created_at: msg.created_at,
            expires_at: msg.expires_at,
            min_pledge_amount: msg.min_pledge_amount,
            cover_image: msg.cover_image,
            auth_key: msg.auth_key,
            tags: msg.tags,
        };
        Ok(spec.sealed())
    }
}
