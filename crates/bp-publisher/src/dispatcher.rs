//! Dispatcher - the single background consumer of the queue set
//!
//! Each tick consults the rate limiter, pops at most one record from the
//! highest-priority non-empty level, releases the queue lock, then awaits the
//! gateway and delivers the outcome. The lock is never held across the
//! gateway call.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info};

use bp_common::PublishStatus;
use crate::gateway::PublishGateway;
use crate::publisher::Shared;
use crate::rate_limiter::DispatchLimiter;

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The run this dispatcher belongs to has ended
    Stopped,
    /// The rate limiter did not permit a dispatch
    Throttled,
    /// Permitted, but every queue was empty
    Idle,
    /// One record was handed to the gateway and its outcome delivered
    Dispatched { level: usize, succeeded: bool },
}

pub struct Dispatcher {
    shared: Arc<Shared>,
    /// Run this dispatcher was created for
    generation: u64,
    gateway: Arc<dyn PublishGateway>,
    limiter: Box<dyn DispatchLimiter>,
    tick_interval: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        shared: Arc<Shared>,
        generation: u64,
        gateway: Arc<dyn PublishGateway>,
        limiter: Box<dyn DispatchLimiter>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            shared,
            generation,
            gateway,
            limiter,
            tick_interval,
        }
    }

    /// Whether the publisher is still in the run that created this dispatcher.
    /// Only meaningful while the queue lock is held.
    fn is_current(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
            && self.shared.generation.load(Ordering::SeqCst) == self.generation
    }

    /// Run one dispatch cycle.
    ///
    /// A dispatcher left over from an earlier run never dispatches; it
    /// returns `TickOutcome::Stopped` instead.
    pub async fn tick(&mut self) -> TickOutcome {
        let (level, record) = {
            let guard = self.shared.queues.lock();
            if !self.is_current() {
                return TickOutcome::Stopped;
            }
            if !self.limiter.permits(Instant::now()) {
                return TickOutcome::Throttled;
            }

            let mut queues = guard.borrow_mut();
            let Some((level, record)) = queues.pop_highest() else {
                return TickOutcome::Idle;
            };
            self.limiter.record(Instant::now());
            let depth = queues.depth(level).unwrap_or(0);
            self.shared.counters.dequeued(level, depth);
            (level, record)
        };

        debug!(level = level, name = %record.name(), "Dispatching event");

        let name = record.name();
        let data = record.data();
        let flags = record.flags();
        let status = PublishStatus::from(self.gateway.submit(name, data, flags).await);

        let succeeded = status.is_success();
        self.shared.counters.completed(level, &status);
        record.complete(status);

        TickOutcome::Dispatched { level, succeeded }
    }

    /// Tick until the shutdown signal fires or its sender is dropped
    pub(crate) async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        info!("Background publish dispatcher started");

        loop {
            if !matches!(shutdown_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                break;
            }

            if self.tick().await == TickOutcome::Stopped {
                break;
            }
            pause(self.tick_interval).await;
        }

        info!("Background publish dispatcher stopped");
    }

}

async fn pause(interval: Duration) {
    if interval.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(interval).await;
    }
}
