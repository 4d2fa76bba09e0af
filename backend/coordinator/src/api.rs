//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use lighthouse_core::{ContractStatus, ProjectSpec};

use crate::coordinator::{self, ProjectLocks, ProjectOptions};
use crate::db::{self, ProjectRow};
use crate::errors::{CoordinatorError, Result};
use crate::ledger::BsvLedger;

pub struct ApiState {
    pub pool: SqlitePool,
    pub ledger: BsvLedger,
    pub max_pledge_bytes: usize,
    pub locks: ProjectLocks,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/:id", get(get_project))
        .route("/api/projects/:id/status", get(get_status))
        .route("/api/projects/:id/pledges", post(submit_pledge))
        .route("/api/projects/:id/pledges/:pledge_id", delete(revoke_pledge))
        .route("/api/projects/:id/claim", post(claim))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub goal_amount: u64,
    pub address: String,
    pub min_pledge_amount: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Base64-encoded JPEG or PNG.
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct SubmitPledgeRequest {
    /// Base64-encoded pledge file.
    pub pledge: String,
}

#[derive(Deserialize)]
pub struct RevokePledgeRequest {
    /// Hex DER signature over the pledge's revocation digest.
    pub signature: String,
}

#[derive(Serialize)]
pub struct OutputView {
    pub amount: u64,
    pub script: String,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub network: String,
    pub goal_amount: u64,
    pub min_pledge_amount: u64,
    pub outputs: Vec<OutputView>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub has_cover_image: bool,
    /// Base64 of the canonical project file.
    pub file: String,
}

impl From<&ProjectSpec> for ProjectResponse {
    fn from(project: &ProjectSpec) -> Self {
        Self {
            id: project.id().to_hex(),
            title: project.title().to_string(),
            description: project.description().to_string(),
            network: project.network().to_string(),
            goal_amount: project.goal_amount(),
            min_pledge_amount: project.min_pledge_amount(),
            outputs: project
                .outputs()
                .iter()
                .map(|o| OutputView {
                    amount: o.amount,
                    script: hex::encode(o.script.as_bytes()),
                })
                .collect(),
            created_at: project.created_at(),
            expires_at: project.expires_at(),
            tags: project.tags().to_vec(),
            has_cover_image: project.cover_image().is_some(),
            file: BASE64.encode(project.serialize()),
        }
    }
}

#[derive(Serialize)]
pub struct ProjectsResponse {
    pub count: usize,
    pub projects: Vec<ProjectRow>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: ContractStatus,
    pub skipped_pledges: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn ok<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

fn error_response(e: CoordinatorError) -> Response {
    let status = e.status_code();
    if status.is_server_error() {
        warn!("Request failed: {e}");
    }
    (
        status,
        Json(serde_json::json!(ErrorResponse {
            error: e.to_string()
        })),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /api/projects`
pub async fn list_projects(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match db::list_projects(&state.pool).await {
        Ok(projects) => ok(
            StatusCode::OK,
            ProjectsResponse {
                count: projects.len(),
                projects,
            },
        ),
        Err(e) => error_response(e),
    }
}

/// `POST /api/projects`
///
/// Creates a project paying the whole goal to `address` and returns it along
/// with the project file contributors need.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    match create_project_inner(&state, req).await {
        Ok(project) => ok(StatusCode::CREATED, ProjectResponse::from(&project)),
        Err(e) => error_response(e),
    }
}

async fn create_project_inner(state: &ApiState, req: CreateProjectRequest) -> Result<ProjectSpec> {
    let cover_image = req
        .cover_image
        .map(|encoded| BASE64.decode(encoded))
        .transpose()?;
    let options = ProjectOptions {
        min_pledge_amount: req.min_pledge_amount,
        expires_at: req.expires_at,
        cover_image,
        tags: req.tags,
    };
    coordinator::create_project(
        &state.pool,
        &state.ledger,
        &req.title,
        &req.description,
        req.goal_amount,
        &req.address,
        options,
    )
    .await
}

/// `GET /api/projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    match coordinator::load_project(&state.pool, &project_id).await {
        Ok(project) => ok(StatusCode::OK, ProjectResponse::from(&project)),
        Err(e) => error_response(e),
    }
}

/// `GET /api/projects/:id/status`
pub async fn get_status(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    match coordinator::status(&state.pool, &project_id).await {
        Ok((status, skipped_pledges)) => ok(
            StatusCode::OK,
            StatusResponse {
                status,
                skipped_pledges,
            },
        ),
        Err(e) => error_response(e),
    }
}

/// `POST /api/projects/:id/pledges`
///
/// Accepts a base64 pledge file if it targets this project, is fully signed
/// and spends no coin another stored pledge already spends.
pub async fn submit_pledge(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
    Json(req): Json<SubmitPledgeRequest>,
) -> impl IntoResponse {
    let bytes = match BASE64.decode(req.pledge) {
        Ok(bytes) => bytes,
        Err(e) => return error_response(e.into()),
    };
    match coordinator::submit_pledge(
        &state.pool,
        &state.locks,
        &project_id,
        &bytes,
        state.max_pledge_bytes,
    )
    .await
    {
        Ok(receipt) => {
            let status = if receipt.stored {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            ok(status, receipt)
        }
        Err(e) => error_response(e),
    }
}

/// `DELETE /api/projects/:id/pledges/:pledge_id`
///
/// Only a holder of one of the pledge's input keys can revoke it.
pub async fn revoke_pledge(
    State(state): State<Arc<ApiState>>,
    Path((project_id, pledge_id)): Path<(String, String)>,
    Json(req): Json<RevokePledgeRequest>,
) -> impl IntoResponse {
    let signature = match hex::decode(req.signature) {
        Ok(signature) => signature,
        Err(e) => return error_response(e.into()),
    };
    match coordinator::revoke_pledge(&state.pool, &state.locks, &project_id, &pledge_id, &signature)
        .await
    {
        Ok(status) => ok(StatusCode::OK, status),
        Err(e) => error_response(e),
    }
}

/// `POST /api/projects/:id/claim`
///
/// Returns the combined claim transaction. It is not broadcast.
pub async fn claim(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    match coordinator::claim(&state.pool, &state.ledger, &project_id).await {
        Ok(claim) => ok(StatusCode::OK, claim),
        Err(e) => error_response(e),
    }
}
