//! Database initialization
//!
//! Opens (or creates) the SQLite database, creates all tables idempotently,
//! runs versioned migrations and seeds defaults. Every pooled connection gets
//! foreign keys, WAL journaling and a busy timeout, so contending writers wait
//! for the lock instead of failing outright.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::Result;

/// How long a connection waits on a locked database before SQLITE_BUSY
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Node types every database starts with
const DEFAULT_NODE_TYPES: [&str; 4] = ["lesson", "quiz", "project", "milestone"];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    // Concurrent completion and rating requests each hold a connection for
    // the length of one short write transaction
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

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Initialize a private in-memory database with the full schema.
///
/// Uses a single connection that never expires, so the database lives exactly
/// as long as the returned pool.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create tables, run migrations, seed defaults (idempotent)
async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    crate::db::settings::create_settings_table(pool).await?;
    create_learner_profiles_table(pool).await?;
    create_courses_table(pool).await?;
    create_node_types_table(pool).await?;
    create_nodes_table(pool).await?;
    create_node_edges_table(pool).await?;
    create_node_completions_table(pool).await?;
    create_course_ratings_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    crate::db::settings::init_default_settings(pool).await?;
    seed_node_types(pool).await?;

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

async fn create_learner_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learner_profiles (
            id INTEGER PRIMARY KEY,
            display_name TEXT NOT NULL,
            xp INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
            level INTEGER NOT NULL DEFAULT 1 CHECK (level >= 0),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_courses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_node_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_types (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_nodes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            node_type_id INTEGER REFERENCES node_types(id),
            title TEXT NOT NULL,
            xp_reward INTEGER NOT NULL DEFAULT 100 CHECK (xp_reward >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_node_edges_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_edges (
            from_node_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            to_node_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            PRIMARY KEY (from_node_id, to_node_id),
            CHECK (from_node_id != to_node_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Completion records: one row per (learner, node), never updated
async fn create_node_completions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_completions (
            learner_id INTEGER NOT NULL REFERENCES learner_profiles(id) ON DELETE CASCADE,
            node_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            completed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (learner_id, node_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Course ratings: one row per (course, learner), updated in place
async fn create_course_ratings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_ratings (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            learner_id INTEGER NOT NULL REFERENCES learner_profiles(id) ON DELETE CASCADE,
            score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
            comment TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            reviewed_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (course_id, learner_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_node_types(pool: &SqlitePool) -> Result<()> {
    for name in DEFAULT_NODE_TYPES {
        sqlx::query("INSERT OR IGNORE INTO node_types (name) VALUES (?)")
            .bind(name)
            .execute(pool)
            .await?;
    }

    Ok(())
}
