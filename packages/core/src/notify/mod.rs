//! Notification dispatch.
//!
//! The engine talks to the messaging channel through the
//! [`NotificationGateway`] capability so tests can substitute a recording
//! fake. [`dispatch`] performs one delivery attempt and persists the outcome
//! to the `notification_log` table — delivery is best-effort and a failure
//! never propagates to the queue operation that triggered it.

pub mod templates;

use async_trait::async_trait;
use chrono::Utc;

use crate::repository::{NotificationRecord, QueueRepository};

/// Outbound messaging capability consumed by the queue engine.
#[async_trait]
pub trait NotificationGateway {
    /// Tell a waiting party how many requests are ahead of theirs.
    async fn notify_waiting(
        &self,
        phone: &str,
        client_name: &str,
        equipment_type: &str,
        ahead_count: i64,
    ) -> bool;

    /// Tell a party their equipment is now being handled.
    async fn notify_opened(
        &self,
        phone: &str,
        client_name: &str,
        equipment_description: &str,
    ) -> bool;
}

/// What to send, plus the context needed to log the attempt.
#[derive(Debug, Clone)]
pub struct OutgoingNotification {
    pub item_id: Option<i64>,
    pub phone: String,
    pub client_name: String,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone)]
pub enum NotificationKind {
    Waiting {
        equipment_type: String,
        ahead_count: i64,
    },
    Opened {
        equipment_description: String,
    },
}

/// Attempt one delivery through the gateway and log the outcome.
pub async fn dispatch(
    gateway: &(dyn NotificationGateway + Send + Sync),
    repository: &QueueRepository,
    notification: OutgoingNotification,
) {
    let (kind, body, delivered) = match &notification.kind {
        NotificationKind::Waiting {
            equipment_type,
            ahead_count,
        } => {
            let body =
                templates::waiting_message(&notification.client_name, equipment_type, *ahead_count);
            let delivered = gateway
                .notify_waiting(
                    &notification.phone,
                    &notification.client_name,
                    equipment_type,
                    *ahead_count,
                )
                .await;
            ("waiting", body, delivered)
        }
        NotificationKind::Opened {
            equipment_description,
        } => {
            let body =
                templates::opened_message(&notification.client_name, equipment_description);
            let delivered = gateway
                .notify_opened(
                    &notification.phone,
                    &notification.client_name,
                    equipment_description,
                )
                .await;
            ("opened", body, delivered)
        }
    };

    if !delivered {
        tracing::warn!(
            "Notification to {} not delivered (kind: {})",
            notification.phone,
            kind
        );
    }

    let record = NotificationRecord {
        id: None,
        item_id: notification.item_id,
        phone: notification.phone.clone(),
        kind: kind.to_string(),
        body,
        delivered,
        sent_at: Utc::now().to_rfc3339(),
    };

    if let Err(err) = repository.log_notification(&record).await {
        tracing::error!(
            "Failed to log notification for {}: {}",
            notification.phone,
            err
        );
    }
}
