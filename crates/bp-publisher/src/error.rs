//! Synchronous rejection reasons for `publish`

use thiserror::Error;

/// Why a submission was refused. No event record exists for a rejected
/// submission and its callback is never invoked.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Publisher is not running")]
    NotRunning,

    #[error("Priority level {level} exceeds number of levels {levels}")]
    InvalidPriority { level: usize, levels: usize },

    #[error("Queue at priority level {level} is full (capacity {capacity})")]
    QueueFull { level: usize, capacity: usize },
}

impl RejectReason {
    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::NotRunning => "not_running",
            RejectReason::InvalidPriority { .. } => "invalid_priority",
            RejectReason::QueueFull { .. } => "queue_full",
        }
    }
}
