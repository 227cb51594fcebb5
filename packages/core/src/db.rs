//! SQLite pool construction and schema bootstrap.
//!
//! `create_pool` is used by `main.rs` with the configured `DATABASE_URL` and
//! by tests with `sqlite::memory:`.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Schema statements applied on startup. Idempotent.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS queue_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER,
        client_name TEXT NOT NULL,
        contact_phone TEXT NOT NULL,
        equipment_type TEXT NOT NULL,
        equipment_description TEXT,
        arrival_date TEXT NOT NULL,
        notes TEXT,
        status TEXT NOT NULL DEFAULT 'PENDING',
        position_index INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_queue_items_status ON queue_items (status)",
    "CREATE TABLE IF NOT EXISTS notification_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER,
        phone TEXT NOT NULL,
        kind TEXT NOT NULL,
        body TEXT NOT NULL,
        delivered INTEGER NOT NULL,
        sent_at TEXT NOT NULL
    )",
];

/// Open a SQLite pool and apply the schema.
///
/// The pool is capped at a single connection: SQLite allows one writer at a
/// time anyway, and a single connection keeps the reindex transaction from
/// interleaving with other writers and makes `sqlite::memory:` databases
/// visible to every caller of the pool.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_pool_applies_schema() {
        let pool = create_pool("sqlite::memory:").await.unwrap();

        // Both tables exist and are queryable.
        sqlx::query("SELECT id FROM queue_items")
            .fetch_all(&pool)
            .await
            .unwrap();
        sqlx::query("SELECT id FROM notification_log")
            .fetch_all(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn schema_bootstrap_is_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
    }
}
