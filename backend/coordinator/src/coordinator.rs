//! Pledge coordination on top of stored projects and pledges.
//!
//! The database is the source of truth. Each operation rebuilds the
//! [`Contract`] for a project from its stored pledges; stored pledges that no
//! longer decode or are rejected by the contract are logged and skipped so a
//! single bad row cannot block a project. Writes to a project are serialized
//! by [`ProjectLocks`] so the duplicate-input check and the insert see the
//! same set of pledges.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use lighthouse_core::{
    Contract, ContractStatus, CoreError, Pledge, PledgeId, ProjectId, ProjectSpec, SigningLedger,
};

use crate::db;
use crate::errors::{CoordinatorError, Result};
use crate::ledger;

/// Optional metadata applied when a project is created.
#[derive(Debug, Default, Clone)]
pub struct ProjectOptions {
    pub min_pledge_amount: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cover_image: Option<Vec<u8>>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PledgeReceipt {
    pub pledge_id: PledgeId,
    pub amount: u64,
    /// `false` when the identical pledge had already been stored.
    pub stored: bool,
    pub status: ContractStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct Claim {
    pub project_id: ProjectId,
    pub txid: String,
    pub raw_tx: String,
    pub input_count: usize,
    pub output_count: usize,
    pub pledge_count: usize,
    pub total_pledged: u64,
    pub total_output: u64,
}

/// A contract rebuilt from storage, with the number of rows that were skipped.
pub struct Rebuilt {
    pub contract: Contract,
    pub skipped: usize,
}

/// One async lock per project, held while a write checks and changes its pledges.
#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ProjectLocks {
    pub async fn acquire(&self, project_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(project_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Create a project paying `goal_amount` to `address`, apply `options` and store it.
pub async fn create_project<L: SigningLedger>(
    pool: &SqlitePool,
    ledger: &L,
    title: &str,
    description: &str,
    goal_amount: u64,
    address: &str,
    options: ProjectOptions,
) -> Result<ProjectSpec> {
    let mut project = ProjectSpec::create(ledger, title, description, goal_amount, address)?;
    if let Some(amount) = options.min_pledge_amount {
        project = project.with_min_pledge_amount(amount)?;
    }
    if let Some(expires_at) = options.expires_at {
        project = project.with_expiry(expires_at);
    }
    if let Some(image) = options.cover_image {
        project = project.with_cover_image(image)?;
    }
    if !options.tags.is_empty() {
        project = project.with_tags(options.tags);
    }

    if db::insert_project(pool, &project).await? {
        info!("Created project {} ({})", project.id(), project.title());
    } else {
        debug!("Project {} already stored", project.id());
    }
    Ok(project)
}

pub async fn load_project(pool: &SqlitePool, project_id: &str) -> Result<ProjectSpec> {
    let data = db::get_project_data(pool, project_id)
        .await?
        .ok_or_else(|| CoordinatorError::NotFound(format!("Project {project_id}")))?;
    Ok(ProjectSpec::load(&data)?)
}

/// Rebuild the contract for `project` from its stored pledges.
pub async fn rebuild_contract(pool: &SqlitePool, project: &ProjectSpec) -> Result<Rebuilt> {
    let rows = db::get_pledges_for_project(pool, &project.id().to_hex()).await?;
    let mut contract = Contract::new(project.clone());
    let mut skipped = 0usize;

    for row in rows {
        let pledge = match Pledge::load(&row.data) {
            Ok(pledge) => pledge,
            Err(e) => {
                warn!("Skipping undecodable pledge {}: {e}", row.id);
                skipped += 1;
                continue;
            }
        };
        if let Err(e) = contract.add_pledge(pledge) {
            warn!("Skipping pledge {} ({} units): {e}", row.id, row.amount);
            skipped += 1;
        }
    }

    debug!(
        "Rebuilt contract {}: {} pledges, {} skipped",
        project.id(),
        contract.pledges().len(),
        skipped
    );
    Ok(Rebuilt { contract, skipped })
}

pub async fn status(pool: &SqlitePool, project_id: &str) -> Result<(ContractStatus, usize)> {
    let project = load_project(pool, project_id).await?;
    let Rebuilt { contract, skipped } = rebuild_contract(pool, &project).await?;
    Ok((contract.status(Utc::now()), skipped))
}

/// Check a pledge file against the project's current contract and store it.
///
/// Resubmitting an already accepted pledge succeeds without storing it twice.
pub async fn submit_pledge(
    pool: &SqlitePool,
    locks: &ProjectLocks,
    project_id: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<PledgeReceipt> {
    if bytes.len() > max_bytes {
        return Err(CoordinatorError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let project = load_project(pool, project_id).await?;
    let pledge = Pledge::load(bytes)?;
    let _guard = locks.acquire(project_id).await;
    let Rebuilt { mut contract, .. } = rebuild_contract(pool, &project).await?;

    let pledge_id = pledge.id();
    let amount = pledge.amount();
    if contract.pledges().iter().any(|p| p.id() == pledge_id) {
        debug!("Pledge {pledge_id} already accepted for project {project_id}");
        return Ok(PledgeReceipt {
            pledge_id,
            amount,
            stored: false,
            status: contract.status(Utc::now()),
        });
    }

    contract.add_pledge(pledge.clone())?;
    let stored = db::insert_pledge(pool, &pledge).await?;
    let status = contract.status(Utc::now());
    info!(
        "Accepted pledge {pledge_id} of {amount} for project {project_id} ({:.2}%)",
        status.progress
    );
    Ok(PledgeReceipt {
        pledge_id,
        amount,
        stored,
        status,
    })
}

/// Revoke a stored pledge and report the resulting status.
///
/// `signature` must be a DER signature over the pledge's revocation digest
/// made with a key that signed one of the pledge's inputs.
pub async fn revoke_pledge(
    pool: &SqlitePool,
    locks: &ProjectLocks,
    project_id: &str,
    pledge_id: &str,
    signature: &[u8],
) -> Result<ContractStatus> {
    let project = load_project(pool, project_id).await?;
    let id: PledgeId = pledge_id.parse()?;
    let _guard = locks.acquire(project_id).await;

    let data = db::get_pledge_data(pool, project_id, &id.to_hex())
        .await?
        .ok_or(CoreError::NotFound(id))?;
    let pledge = Pledge::load(&data)?;
    ledger::verify_revocation(&pledge, signature)
        .map_err(|e| CoordinatorError::Unauthorized(e.to_string()))?;

    let Rebuilt { mut contract, .. } = rebuild_contract(pool, &project).await?;
    match contract.remove_pledge(id) {
        Ok(removed) => debug!("Removed pledge {} of {}", removed.id(), removed.amount()),
        // Skipped rows are not in the contract but may still be deleted.
        Err(CoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    if !db::delete_pledge(pool, project_id, &id.to_hex()).await? {
        return Err(CoreError::NotFound(id).into());
    }
    info!("Revoked pledge {id} from project {project_id}");
    Ok(contract.status(Utc::now()))
}

/// Combine the stored pledges into the claim transaction. Nothing is broadcast.
pub async fn claim<L: SigningLedger>(
    pool: &SqlitePool,
    ledger: &L,
    project_id: &str,
) -> Result<Claim> {
    let project = load_project(pool, project_id).await?;
    let Rebuilt { mut contract, skipped } = rebuild_contract(pool, &project).await?;
    if skipped > 0 {
        warn!("Claiming project {project_id} without {skipped} skipped pledges");
    }

    let tx = contract.combine()?;
    let txid = ledger.transaction_id(&tx);
    info!(
        "Built claim {txid} for project {project_id}: {} inputs, {} outputs",
        tx.inputs.len(),
        tx.outputs.len()
    );

    Ok(Claim {
        project_id: project.id(),
        txid: txid.to_string(),
        raw_tx: hex::encode(ledger.serialize_transaction(&tx)),
        input_count: tx.inputs.len(),
        output_count: tx.outputs.len(),
        pledge_count: contract.pledges().len(),
        total_pledged: contract.total_pledged(),
        total_output: tx.output_value(),
    })
}
