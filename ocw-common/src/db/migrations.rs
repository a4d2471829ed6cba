//! Database schema migrations
//!
//! Versioned, idempotent schema changes applied after the base tables are
//! created. Progress is tracked in the `schema_version` table.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field have already applied them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Stay idempotent** - use `IF NOT EXISTS` or check `pragma_table_info` first

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if no version has been recorded yet
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("Migration v3 completed");
    }

    Ok(())
}

/// Migration v1: at most one non-forced pending task per (target, type)
///
/// Concurrent launches that both pass the launcher's read check collide
/// here. Rows with `forced = 1` are outside the index.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: unique pending task index");

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_single_pending
        ON tasks (workspace_id, transcript_id, type)
        WHERE status = 'pending' AND forced = 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: index speaker segments by transcript
///
/// Ingestion checks for existing segments and forced re-transcription
/// clears them; both filter by transcript.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: speaker segment transcript index");

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_speaker_segments_transcript
        ON speaker_segments (workspace_id, transcript_id, start_timestamp)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v3: flag tasks whose success callback carried a result
///
/// Failure paths also write `response_body` (launch and worker error
/// messages), so only this flag marks a body as a reprocessable result.
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v3: tasks.has_result column");

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('tasks') WHERE name = 'has_result'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  has_result column already exists - skipping");
        return Ok(());
    }

    sqlx::query("ALTER TABLE tasks ADD COLUMN has_result INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await?;

    // Backfill: succeeded bodies, and processing failures whose error differs from the body
    sqlx::query(
        r#"
        UPDATE tasks SET has_result = 1
        WHERE response_body IS NOT NULL
          AND (status = 'succeeded'
               OR (error_message IS NOT NULL AND error_message <> response_body))
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
