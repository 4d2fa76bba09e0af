//! Database layer: migrations and project/pledge storage.
//!
//! Both tables hold the canonical file bytes (`data`) keyed by content id; the
//! remaining columns are denormalised for listing without decoding.

use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use lighthouse_core::{Pledge, ProjectSpec};

use crate::errors::Result;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    // Make sure the file is created if it doesn't exist yet.
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    let url = if url.contains(":memory:") || url.contains("mode=") {
        url
    } else if url.contains('?') {
        format!("{url}&mode=rwc")
    } else {
        format!("{url}?mode=rwc")
    };

    // Every connection to an in-memory database sees its own empty database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub title: String,
    pub goal_amount: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PledgeRow {
    pub id: String,
    pub amount: i64,
    pub data: Vec<u8>,
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

/// Store a project. Returns `false` if a project with the same id exists.
pub async fn insert_project(pool: &SqlitePool, project: &ProjectSpec) -> Result<bool> {
    let rows_affected = sqlx::query(
        r#"
        INSERT OR IGNORE INTO projects (id, title, goal_amount, data)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(project.id().to_hex())
    .bind(project.title())
    .bind(to_sql_amount(project.goal_amount()))
    .bind(project.serialize())
    .execute(pool)
    .await?
    .rows_affected();
    Ok(rows_affected > 0)
}

/// Raw project file bytes, if the project is known.
pub async fn get_project_data(pool: &SqlitePool, id: &str) -> Result<Option<Vec<u8>>> {
    let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT data FROM projects WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(data,)| data))
}

/// All projects, newest first.
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<ProjectRow>> {
    let rows = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, title, goal_amount, created_at
        FROM   projects
        ORDER  BY created_at DESC, rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Pledges
// ─────────────────────────────────────────────────────────

/// Store a pledge. Resubmitting the same pledge is a no-op returning `false`.
pub async fn insert_pledge(pool: &SqlitePool, pledge: &Pledge) -> Result<bool> {
    let rows_affected = sqlx::query(
        r#"
        INSERT OR IGNORE INTO pledges (id, project_id, amount, data)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(pledge.id().to_hex())
    .bind(pledge.project_id().to_hex())
    .bind(to_sql_amount(pledge.amount()))
    .bind(pledge.serialize())
    .execute(pool)
    .await?
    .rows_affected();
    Ok(rows_affected > 0)
}

/// Pledges for a project in submission order.
pub async fn get_pledges_for_project(pool: &SqlitePool, project_id: &str) -> Result<Vec<PledgeRow>> {
    let rows = sqlx::query_as::<_, PledgeRow>(
        r#"
        SELECT id, amount, data
        FROM   pledges
        WHERE  project_id = ?1
        ORDER  BY created_at ASC, rowid ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Stored bytes of one pledge of a project.
pub async fn get_pledge_data(
    pool: &SqlitePool,
    project_id: &str,
    pledge_id: &str,
) -> Result<Option<Vec<u8>>> {
    let row: Option<(Vec<u8>,)> =
        sqlx::query_as("SELECT data FROM pledges WHERE project_id = ?1 AND id = ?2")
            .bind(project_id)
            .bind(pledge_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(data,)| data))
}

/// Delete one pledge. Returns `false` if it was not stored for that project.
pub async fn delete_pledge(pool: &SqlitePool, project_id: &str, pledge_id: &str) -> Result<bool> {
    let rows_affected = sqlx::query("DELETE FROM pledges WHERE project_id = ?1 AND id = ?2")
        .bind(project_id)
        .bind(pledge_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows_affected > 0)
}

/// SQLite integers are signed; amounts above `i64::MAX` are clamped for the
/// listing columns only. The authoritative value stays in `data`.
fn to_sql_amount(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}
