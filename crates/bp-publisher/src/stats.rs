//! Publisher statistics and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use metrics::{counter, gauge};
use serde::Serialize;

use bp_common::PublishStatus;
use crate::error::RejectReason;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub level: usize,
    pub depth: usize,
    pub capacity: usize,
}

/// Point-in-time snapshot of a publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublisherStats {
    pub running: bool,
    pub levels: Vec<LevelStats>,
    pub accepted: u64,
    pub rejected: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl PublisherStats {
    pub fn queued(&self) -> usize {
        self.levels.iter().map(|l| l.depth).sum()
    }
}

/// Lifetime counters, mirrored into the `metrics` facade
#[derive(Debug, Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    dispatched: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    pub(crate) fn accepted(&self, level: usize, depth: usize) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        counter!("background_publish_accepted_total", "level" => level.to_string()).increment(1);
        record_depth(level, depth);
    }

    pub(crate) fn rejected(&self, reason: &RejectReason) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        counter!("background_publish_rejected_total", "reason" => reason.label()).increment(1);
    }

    pub(crate) fn dequeued(&self, level: usize, depth: usize) {
        record_depth(level, depth);
    }

    pub(crate) fn completed(&self, level: usize, status: &PublishStatus) {
        match status {
            PublishStatus::Success => {
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                counter!("background_publish_dispatched_total", "level" => level.to_string()).increment(1);
            }
            PublishStatus::Failure(_) => {
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                self.failed.fetch_add(1, Ordering::Relaxed);
                counter!("background_publish_dispatched_total", "level" => level.to_string()).increment(1);
                counter!("background_publish_failed_total", "level" => level.to_string()).increment(1);
            }
            PublishStatus::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                counter!("background_publish_cancelled_total", "level" => level.to_string()).increment(1);
            }
        }
    }

    pub(crate) fn snapshot(&self, running: bool, levels: Vec<LevelStats>) -> PublisherStats {
        PublisherStats {
            running,
            levels,
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

fn record_depth(level: usize, depth: usize) {
    gauge!("background_publish_queue_depth", "level" => level.to_string()).set(depth as f64);
}
