//! Read-only view over the notification delivery log.
//!
//! Routes:
//! - `GET /queue/notifications` — paginated delivery attempts
//!
//! The log records what the queue tried to send and whether the gateway
//! accepted it; queue behaviour never depends on it.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::repository::{NotificationRecord, QueueRepository, VALID_KINDS};

/// Shared state for the notification-log route.
pub type NotificationsState = Arc<QueueRepository>;

#[derive(Debug, Deserialize)]
pub struct NotificationHistoryQuery {
    pub limit: Option<i64>,
    pub kind: Option<String>,
    pub delivered: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct NotificationHistoryResponse {
    pub total: i64,
    pub items: Vec<NotificationRecord>,
}

/// `GET /queue/notifications` — paginated delivery log.
///
/// Query params:
/// - `limit`     — max items to return (default 20, clamped to 100)
/// - `kind`      — optional filter: waiting | opened
/// - `delivered` — optional bool filter
pub async fn get_notification_history(
    State(repository): State<NotificationsState>,
    Query(params): Query<NotificationHistoryQuery>,
) -> Result<Json<NotificationHistoryResponse>, (StatusCode, Json<serde_json::Value>)> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let kind = params.kind.as_deref();
    let delivered = params.delivered;

    if let Some(kind) = kind {
        if !VALID_KINDS.contains(&kind) {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": format!(
                        "Invalid kind '{}'. Must be one of: {}",
                        kind,
                        VALID_KINDS.join(", ")
                    )
                })),
            ));
        }
    }

    let (items, total) = tokio::try_join!(
        repository.query_notification_log(limit, kind, delivered),
        repository.count_notification_log(kind, delivered),
    )
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    Ok(Json(NotificationHistoryResponse { total, items }))
}
