pub mod images;
pub mod models;
pub mod posts;
pub mod users;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// Attempts given to every multi-row write before it is reported as failed.
pub const TRANSACTION_ATTEMPTS: u32 = 3;

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("001_users", include_str!("../../migrations/001_users.sql")),
    ("002_posts", include_str!("../../migrations/002_posts.sql")),
    (
        "003_soft_delete_posts",
        include_str!("../../migrations/003_soft_delete_posts.sql"),
    ),
];

const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// Single-connection in-memory pool; every checkout sees the same database.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager =
        SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Run `work` inside an IMMEDIATE transaction, committing on `Ok` and
/// rolling back on `Err`.
///
/// Lock contention (`SQLITE_BUSY` / `SQLITE_LOCKED`) reruns the whole unit,
/// up to `attempts` runs in total. Any other error is returned as-is after
/// rollback. `work` may therefore be called more than once and must not
/// carry state between runs.
pub fn transaction<T, F>(conn: &mut Connection, attempts: u32, mut work: F) -> AppResult<T>
where
    F: FnMut(&Transaction<'_>) -> AppResult<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match run_once(conn, &mut work) {
            Err(err) if err.is_transient() => {
                if attempt >= attempts {
                    return Err(AppError::Internal(format!(
                        "transaction gave up after {} attempts: {}",
                        attempts, err
                    )));
                }
                tracing::warn!(attempt, error = %err, "Transaction conflict, retrying");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

fn run_once<T, F>(conn: &mut Connection, work: &mut F) -> AppResult<T>
where
    F: FnMut(&Transaction<'_>) -> AppResult<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Dropping `tx` on the error path rolls back.
    let value = work(&tx)?;
    tx.commit()?;
    Ok(value)
}
