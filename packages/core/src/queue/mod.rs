//! Equipment opening queue.
//!
//! Waiting intake requests are ranked by `(arrival_date, created_at)` and
//! carry a dense 0-based `position_index` while pending. The engine owns the
//! only code paths allowed to mutate `status` and `position_index`; ordering
//! itself is derived by the pure functions in [`ordering`].

pub mod engine;
pub mod error;
pub mod ordering;
pub mod types;

pub use engine::QueueEngine;
pub use error::{FieldError, QueueError};
pub use types::{EnqueueInput, NewQueueItem, QueueItem, QueueStatus};
