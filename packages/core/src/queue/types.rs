use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a queue item. `Opened` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "OPENED")]
    Opened,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "PENDING",
            QueueStatus::Opened => "OPENED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(QueueStatus::Pending),
            "OPENED" => Some(QueueStatus::Opened),
            _ => None,
        }
    }
}

/// One piece of equipment waiting to be (or already) opened for intake.
///
/// `client_name` and `contact_phone` are a snapshot taken at enqueue time so
/// the queue keeps working if the client record changes later.
/// `position_index` is meaningful only while `status` is `PENDING`; once the
/// item is opened it keeps the last index it held as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub client_id: Option<i64>,
    pub client_name: String,
    pub contact_phone: String,
    pub equipment_type: String,
    pub equipment_description: Option<String>,
    pub arrival_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: QueueStatus,
    pub position_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw enqueue input as received from the HTTP layer. Validated by the
/// engine; missing required fields arrive as empty strings.
#[derive(Debug, Clone)]
pub struct EnqueueInput {
    pub client_id: Option<i64>,
    pub client_name: String,
    pub contact_phone: String,
    pub equipment_type: String,
    pub equipment_description: Option<String>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// A validated item ready to be persisted as `PENDING`.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub client_id: Option<i64>,
    pub client_name: String,
    pub contact_phone: String,
    pub equipment_type: String,
    pub equipment_description: Option<String>,
    pub arrival_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Rank movement of one still-pending item across an open transition.
#[derive(Debug, Clone)]
pub struct PositionChange {
    pub item: QueueItem,
    pub before: i64,
    pub after: i64,
}

/// Result of a committed open transition: the opened item plus the rank
/// movement of every item left in the pending set.
#[derive(Debug)]
pub struct OpenTransition {
    pub opened: QueueItem,
    pub remaining: Vec<PositionChange>,
}
