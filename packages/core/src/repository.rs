//! Database repository for the opening queue.
//!
//! All SQLite read/write logic lives here. The two mutating entry points,
//! [`QueueRepository::insert_and_reindex`] and
//! [`QueueRepository::open_and_reindex`], run mutation plus position
//! recompute inside one transaction so concurrent operations never observe a
//! partially reindexed pending set.
//!
//! Timestamps are stored as RFC 3339 strings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::queue::ordering;
use crate::queue::types::{NewQueueItem, OpenTransition, PositionChange, QueueItem, QueueStatus};

/// Valid values for the notification log `kind` column.
pub const VALID_KINDS: &[&str] = &["waiting", "opened"];

/// A single notification delivery attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Option<i64>,
    pub item_id: Option<i64>,
    pub phone: String,
    pub kind: String,
    pub body: String,
    pub delivered: bool,
    pub sent_at: String,
}

/// Outcome of an open transition attempt.
#[derive(Debug)]
pub enum OpenOutcome {
    Opened(OpenTransition),
    NotFound,
    AlreadyOpened,
}

/// Repository for reading and writing queue state to SQLite.
pub struct QueueRepository {
    pool: SqlitePool,
}

impl QueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new pending item and recompute every pending position in the
    /// same transaction. Returns the created item with its final index.
    pub async fn insert_and_reindex(
        &self,
        new_item: &NewQueueItem,
    ) -> Result<QueueItem, sqlx::Error> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO queue_items
             (client_id, client_name, contact_phone, equipment_type, equipment_description,
              arrival_date, notes, status, position_index, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'PENDING', 0, ?, ?)",
        )
        .bind(new_item.client_id)
        .bind(&new_item.client_name)
        .bind(&new_item.contact_phone)
        .bind(&new_item.equipment_type)
        .bind(&new_item.equipment_description)
        .bind(new_item.arrival_date.to_rfc3339())
        .bind(&new_item.notes)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();

        let pending = fetch_pending_tx(&mut tx).await?;
        let ranks = ordering::rank_pending(&pending);
        persist_ranks(&mut tx, &pending, &ranks, &now_str).await?;

        tx.commit().await?;

        let mut created = pending
            .into_iter()
            .find(|item| item.id == id)
            .ok_or(sqlx::Error::RowNotFound)?;
        if let Some(rank) = ranks.get(&id) {
            created.position_index = *rank;
        }
        Ok(created)
    }

    /// Flip a pending item to `OPENED` and recompute the remaining pending
    /// positions in the same transaction.
    ///
    /// The returned transition carries the before/after rank of every item
    /// still pending, so the engine can decide who moved up. The opened
    /// item's own `position_index` is left untouched — frozen history.
    pub async fn open_and_reindex(&self, id: i64) -> Result<OpenOutcome, sqlx::Error> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT * FROM queue_items ORDER BY arrival_date ASC, created_at ASC, id ASC",
        )
        .fetch_all(&mut *tx)
        .await?;
        let items: Vec<QueueItem> = rows.into_iter().filter_map(map_item_row).collect();

        let target = match items.iter().find(|item| item.id == id) {
            Some(item) => item.clone(),
            None => return Ok(OpenOutcome::NotFound),
        };
        if target.status == QueueStatus::Opened {
            return Ok(OpenOutcome::AlreadyOpened);
        }

        let before = ordering::rank_pending(&items);

        sqlx::query("UPDATE queue_items SET status = 'OPENED', updated_at = ? WHERE id = ?")
            .bind(&now_str)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let remaining: Vec<QueueItem> = items
            .iter()
            .filter(|item| item.status == QueueStatus::Pending && item.id != id)
            .cloned()
            .collect();
        let after = ordering::rank_pending(&remaining);
        persist_ranks(&mut tx, &remaining, &after, &now_str).await?;

        tx.commit().await?;

        let mut opened = target;
        opened.status = QueueStatus::Opened;
        opened.updated_at = now;

        let changes = remaining
            .into_iter()
            .filter_map(|mut item| {
                let rank_before = before.get(&item.id).copied()?;
                let rank_after = after.get(&item.id).copied()?;
                item.position_index = rank_after;
                Some(PositionChange {
                    item,
                    before: rank_before,
                    after: rank_after,
                })
            })
            .collect();

        Ok(OpenOutcome::Opened(OpenTransition {
            opened,
            remaining: changes,
        }))
    }

    /// Recompute and persist every pending position from scratch. Returns
    /// the number of rows whose index changed. Idempotent.
    pub async fn reindex_pending(&self) -> Result<usize, sqlx::Error> {
        let now_str = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        let pending = fetch_pending_tx(&mut tx).await?;
        let ranks = ordering::rank_pending(&pending);
        let changed = persist_ranks(&mut tx, &pending, &ranks, &now_str).await?;
        tx.commit().await?;

        Ok(changed)
    }

    /// Fetch every item, pending and opened, in queue order.
    pub async fn fetch_all(&self) -> Result<Vec<QueueItem>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM queue_items ORDER BY arrival_date ASC, created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(map_item_row).collect())
    }

    /// Fetch only pending items, in queue order.
    pub async fn fetch_pending(&self) -> Result<Vec<QueueItem>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM queue_items
             WHERE status = 'PENDING'
             ORDER BY arrival_date ASC, created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(map_item_row).collect())
    }

    // ---- Notification log ----

    /// Log a notification delivery attempt (success or failure).
    pub async fn log_notification(&self, record: &NotificationRecord) -> Result<(), sqlx::Error> {
        let delivered_int: i64 = if record.delivered { 1 } else { 0 };

        sqlx::query(
            "INSERT INTO notification_log (item_id, phone, kind, body, delivered, sent_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.item_id)
        .bind(&record.phone)
        .bind(&record.kind)
        .bind(&record.body)
        .bind(delivered_int)
        .bind(&record.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Query the delivery log with optional filters. `limit` is clamped to 100.
    pub async fn query_notification_log(
        &self,
        limit: i64,
        kind_filter: Option<&str>,
        delivered_filter: Option<bool>,
    ) -> Result<Vec<NotificationRecord>, sqlx::Error> {
        let limit = limit.clamp(1, 100);

        // SQLite doesn't have great support for optional binds, so we use a
        // WHERE 1=1 pattern and append conditions.
        let mut conditions = vec!["1=1"];
        if kind_filter.is_some() {
            conditions.push("kind = ?");
        }
        if delivered_filter.is_some() {
            conditions.push("delivered = ?");
        }

        let sql = format!(
            "SELECT id, item_id, phone, kind, body, delivered, sent_at
             FROM notification_log
             WHERE {}
             ORDER BY sent_at DESC, id DESC
             LIMIT ?",
            conditions.join(" AND ")
        );

        let rows = {
            let mut q = sqlx::query(&sql);
            if let Some(kind) = kind_filter {
                q = q.bind(kind);
            }
            if let Some(delivered) = delivered_filter {
                q = q.bind(if delivered { 1i64 } else { 0i64 });
            }
            q.bind(limit).fetch_all(&self.pool).await?
        };

        let records = rows
            .into_iter()
            .filter_map(|row| {
                use sqlx::Row;
                let id: i64 = row.try_get("id").ok()?;
                let item_id: Option<i64> = row.try_get("item_id").ok()?;
                let phone: String = row.try_get("phone").ok()?;
                let kind: String = row.try_get("kind").ok()?;
                let body: String = row.try_get("body").ok()?;
                let delivered: i64 = row.try_get("delivered").ok()?;
                let sent_at: String = row.try_get("sent_at").ok()?;

                Some(NotificationRecord {
                    id: Some(id),
                    item_id,
                    phone,
                    kind,
                    body,
                    delivered: delivered != 0,
                    sent_at,
                })
            })
            .collect();

        Ok(records)
    }

    /// Count delivery-log rows matching optional filters (pagination totals).
    pub async fn count_notification_log(
        &self,
        kind_filter: Option<&str>,
        delivered_filter: Option<bool>,
    ) -> Result<i64, sqlx::Error> {
        let mut conditions = vec!["1=1"];
        if kind_filter.is_some() {
            conditions.push("kind = ?");
        }
        if delivered_filter.is_some() {
            conditions.push("delivered = ?");
        }

        let sql = format!(
            "SELECT COUNT(*) as cnt FROM notification_log WHERE {}",
            conditions.join(" AND ")
        );

        let row = {
            let mut q = sqlx::query(&sql);
            if let Some(kind) = kind_filter {
                q = q.bind(kind);
            }
            if let Some(delivered) = delivered_filter {
                q = q.bind(if delivered { 1i64 } else { 0i64 });
            }
            q.fetch_one(&self.pool).await?
        };

        use sqlx::Row;
        let count: i64 = row.try_get("cnt").unwrap_or(0);
        Ok(count)
    }
}

// ---- Row mapping ----

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn map_item_row(row: SqliteRow) -> Option<QueueItem> {
    use sqlx::Row;
    let id: i64 = row.try_get("id").ok()?;
    let client_id: Option<i64> = row.try_get("client_id").ok()?;
    let client_name: String = row.try_get("client_name").ok()?;
    let contact_phone: String = row.try_get("contact_phone").ok()?;
    let equipment_type: String = row.try_get("equipment_type").ok()?;
    let equipment_description: Option<String> = row.try_get("equipment_description").ok()?;
    let arrival_raw: String = row.try_get("arrival_date").ok()?;
    let notes: Option<String> = row.try_get("notes").ok()?;
    let status_raw: String = row.try_get("status").ok()?;
    let position_index: i64 = row.try_get("position_index").ok()?;
    let created_raw: String = row.try_get("created_at").ok()?;
    let updated_raw: String = row.try_get("updated_at").ok()?;

    Some(QueueItem {
        id,
        client_id,
        client_name,
        contact_phone,
        equipment_type,
        equipment_description,
        arrival_date: parse_timestamp(&arrival_raw)?,
        notes,
        status: QueueStatus::parse(&status_raw)?,
        position_index,
        created_at: parse_timestamp(&created_raw)?,
        updated_at: parse_timestamp(&updated_raw)?,
    })
}

async fn fetch_pending_tx(
    tx: &mut Transaction<'_, Sqlite>,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM queue_items WHERE status = 'PENDING'")
        .fetch_all(&mut **tx)
        .await?;

    Ok(rows.into_iter().filter_map(map_item_row).collect())
}

/// Write every rank that differs from the stored index. Returns the number
/// of rows updated.
async fn persist_ranks(
    tx: &mut Transaction<'_, Sqlite>,
    items: &[QueueItem],
    ranks: &HashMap<i64, i64>,
    now_str: &str,
) -> Result<usize, sqlx::Error> {
    let mut changed = 0;
    for item in items {
        let rank = match ranks.get(&item.id) {
            Some(rank) => *rank,
            None => continue,
        };
        if rank != item.position_index {
            sqlx::query("UPDATE queue_items SET position_index = ?, updated_at = ? WHERE id = ?")
                .bind(rank)
                .bind(now_str)
                .bind(item.id)
                .execute(&mut **tx)
                .await?;
            changed += 1;
        }
    }
    Ok(changed)
}
