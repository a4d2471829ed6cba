//! Database initialization
//!
//! Opens (or creates) the SQLite database, creates every table the task
//! pipeline needs, then applies versioned migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas are per-connection in SQLite, so they go on the connect
    // options rather than being executed once against the pool.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_transcripts_table(pool).await?;
    create_tasks_table(pool).await?;
    create_speakers_table(pool).await?;
    create_speaker_tags_table(pool).await?;
    create_speaker_segments_table(pool).await?;
    create_utterances_table(pool).await?;
    create_subjects_table(pool).await?;
    create_decisions_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_transcripts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            workspace_id TEXT NOT NULL,
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            video_url TEXT,
            audio_url TEXT,
            mux_playback_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (workspace_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tasks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'succeeded', 'failed')),
            stage TEXT,
            percent_complete REAL,
            request_body TEXT NOT NULL,
            response_body TEXT,
            error_message TEXT,
            version INTEGER,
            forced INTEGER NOT NULL DEFAULT 0,
            workspace_id TEXT NOT NULL,
            transcript_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (workspace_id, transcript_id)
                REFERENCES transcripts (workspace_id, id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tasks_target ON tasks (workspace_id, transcript_id, type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_speakers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speakers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            person_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_speaker_tags_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speaker_tags (
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            speaker_id TEXT REFERENCES speakers (id) ON DELETE SET NULL,
            workspace_id TEXT NOT NULL,
            transcript_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (workspace_id, transcript_id)
                REFERENCES transcripts (workspace_id, id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_speaker_segments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speaker_segments (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            transcript_id TEXT NOT NULL,
            speaker_tag_id TEXT NOT NULL REFERENCES speaker_tags (id),
            start_timestamp REAL NOT NULL,
            end_timestamp REAL NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (workspace_id, transcript_id)
                REFERENCES transcripts (workspace_id, id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_utterances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS utterances (
            id TEXT PRIMARY KEY,
            speaker_segment_id TEXT NOT NULL
                REFERENCES speaker_segments (id) ON DELETE CASCADE,
            start_timestamp REAL NOT NULL,
            end_timestamp REAL NOT NULL,
            text TEXT NOT NULL,
            drift REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_utterances_segment ON utterances (speaker_segment_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_subjects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            transcript_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            agenda_item_index INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (workspace_id, transcript_id)
                REFERENCES transcripts (workspace_id, id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_decisions_table(pool: &SqlitePool) -> Result<()> {
    // No foreign key on subject_id: decisions outlive agenda re-processing,
    // which replaces the subject rows.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decisions (
            subject_id TEXT PRIMARY KEY,
            pdf_url TEXT NOT NULL,
            ada TEXT,
            protocol_number TEXT,
            title TEXT,
            issue_date TEXT,
            task_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
