//! Queue engine: admission ordering and opening transitions.
//!
//! Every mutating operation takes the queue-wide advisory lock, runs its
//! storage work as one transaction via the repository, and only then fans
//! out best-effort notifications. The lock spans the whole
//! read-compute-write sequence because the position invariant covers the
//! entire pending set, not a single row.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex;

use crate::notify::{self, NotificationGateway, NotificationKind, OutgoingNotification};
use crate::queue::error::{FieldError, QueueError};
use crate::queue::ordering;
use crate::queue::types::{EnqueueInput, NewQueueItem, QueueItem};
use crate::repository::{OpenOutcome, QueueRepository};

/// Attempts per mutating operation when SQLite reports a locked database.
const WRITE_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 25;

pub struct QueueEngine {
    repository: Arc<QueueRepository>,
    gateway: Arc<dyn NotificationGateway + Send + Sync>,
    queue_lock: Mutex<()>,
}

impl QueueEngine {
    pub fn new(
        repository: Arc<QueueRepository>,
        gateway: Arc<dyn NotificationGateway + Send + Sync>,
    ) -> Self {
        Self {
            repository,
            gateway,
            queue_lock: Mutex::new(()),
        }
    }

    /// Admit a new intake request into the queue.
    ///
    /// The item is ranked by its arrival date, so it is not necessarily
    /// last: an item that physically arrived earlier than existing pending
    /// items is inserted ahead of them. One waiting notification is sent to
    /// the new item's contact with the count of requests that arrived
    /// strictly before it.
    pub async fn enqueue(&self, input: EnqueueInput) -> Result<QueueItem, QueueError> {
        validate(&input)?;

        let new_item = NewQueueItem {
            client_id: input.client_id,
            client_name: input.client_name.trim().to_string(),
            contact_phone: input.contact_phone.trim().to_string(),
            equipment_type: input.equipment_type.trim().to_string(),
            equipment_description: input.equipment_description,
            arrival_date: input.arrival_date.unwrap_or_else(Utc::now),
            notes: input.notes,
        };

        let (created, ahead) = {
            let _guard = self.queue_lock.lock().await;
            let created = self.insert_with_retries(&new_item).await?;
            let pending = self.repository.fetch_pending().await?;
            let ahead = ordering::ahead_count(&pending, &created);
            (created, ahead)
        };

        notify::dispatch(
            self.gateway.as_ref(),
            &self.repository,
            OutgoingNotification {
                item_id: Some(created.id),
                phone: created.contact_phone.clone(),
                client_name: created.client_name.clone(),
                kind: NotificationKind::Waiting {
                    equipment_type: created.equipment_type.clone(),
                    ahead_count: ahead,
                },
            },
        )
        .await;

        tracing::info!(
            "Enqueued item {} at position {} ({} ahead)",
            created.id,
            created.position_index,
            ahead
        );

        Ok(created)
    }

    /// Open a specific pending item.
    ///
    /// Fails with [`QueueError::NotFound`] when no item has that id and
    /// with [`QueueError::AlreadyOpened`] when the item left the pending
    /// set earlier — opening is terminal and never a silent no-op.
    ///
    /// After the transition commits, the opened party is notified, and every
    /// remaining item whose rank improved gets a position update with its
    /// new ahead count. Items whose rank did not change are not messaged.
    pub async fn open(&self, id: i64) -> Result<QueueItem, QueueError> {
        let transition = {
            let _guard = self.queue_lock.lock().await;
            match self.open_with_retries(id).await? {
                OpenOutcome::NotFound => return Err(QueueError::NotFound),
                OpenOutcome::AlreadyOpened => return Err(QueueError::AlreadyOpened),
                OpenOutcome::Opened(transition) => transition,
            }
        };

        let opened = &transition.opened;
        let equipment_label = match &opened.equipment_description {
            Some(description) => format!("{} ({})", opened.equipment_type, description),
            None => opened.equipment_type.clone(),
        };

        notify::dispatch(
            self.gateway.as_ref(),
            &self.repository,
            OutgoingNotification {
                item_id: Some(opened.id),
                phone: opened.contact_phone.clone(),
                client_name: opened.client_name.clone(),
                kind: NotificationKind::Opened {
                    equipment_description: equipment_label,
                },
            },
        )
        .await;

        for change in &transition.remaining {
            if change.after >= change.before {
                continue;
            }
            notify::dispatch(
                self.gateway.as_ref(),
                &self.repository,
                OutgoingNotification {
                    item_id: Some(change.item.id),
                    phone: change.item.contact_phone.clone(),
                    client_name: change.item.client_name.clone(),
                    kind: NotificationKind::Waiting {
                        equipment_type: change.item.equipment_type.clone(),
                        ahead_count: change.after,
                    },
                },
            )
            .await;
        }

        tracing::info!("Opened item {}", transition.opened.id);

        Ok(transition.opened)
    }

    /// Return every item with positions re-derived on read.
    ///
    /// The stored index is never trusted for display: pending positions are
    /// recomputed from the same ranking function the mutating paths persist,
    /// so a missed reindex can't surface a stale value. Opened items keep
    /// their frozen historical index.
    pub async fn list(&self) -> Result<Vec<QueueItem>, QueueError> {
        let mut items = self.repository.fetch_all().await?;

        let ranks = ordering::rank_pending(&items);
        for item in &mut items {
            if let Some(rank) = ranks.get(&item.id) {
                item.position_index = *rank;
            }
        }
        ordering::sort_for_display(&mut items);

        Ok(items)
    }

    /// Re-derive and persist every pending position. Maintenance entry
    /// point; safe to call at any time.
    pub async fn recompute(&self) -> Result<usize, QueueError> {
        let _guard = self.queue_lock.lock().await;
        Ok(self.repository.reindex_pending().await?)
    }

    async fn insert_with_retries(&self, new_item: &NewQueueItem) -> Result<QueueItem, QueueError> {
        let mut attempt = 0;
        loop {
            match self.repository.insert_and_reindex(new_item).await {
                Ok(item) => return Ok(item),
                Err(err) if is_busy(&err) && attempt + 1 < WRITE_ATTEMPTS => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    tracing::warn!("Queue insert contended, retry {} in {:?}", attempt, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(QueueError::Storage(err)),
            }
        }
    }

    async fn open_with_retries(&self, id: i64) -> Result<OpenOutcome, QueueError> {
        let mut attempt = 0;
        loop {
            match self.repository.open_and_reindex(id).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if is_busy(&err) && attempt + 1 < WRITE_ATTEMPTS => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    tracing::warn!("Queue open contended, retry {} in {:?}", attempt, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(QueueError::Storage(err)),
            }
        }
    }
}

fn validate(input: &EnqueueInput) -> Result<(), QueueError> {
    let mut errors = Vec::new();
    if input.client_name.trim().is_empty() {
        errors.push(FieldError::required("client_name"));
    }
    if input.contact_phone.trim().is_empty() {
        errors.push(FieldError::required("contact_phone"));
    }
    if input.equipment_type.trim().is_empty() {
        errors.push(FieldError::required("equipment_type"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(QueueError::Validation(errors))
    }
}

fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("locked"),
        _ => false,
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..BACKOFF_BASE_MS);
    Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt) + jitter)
}
