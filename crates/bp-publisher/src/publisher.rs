//! BackgroundPublisher - submission API and start/stop lifecycle
//!
//! Producers call `publish` from any thread; it only touches the queue set
//! under its lock and never waits on the network. `start` spawns the
//! dispatcher task, `stop` joins it and then drains whatever is still queued.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use bp_common::{PublishFlags, PublishStatus};
use crate::config::PublisherConfig;
use crate::dispatcher::Dispatcher;
use crate::error::RejectReason;
use crate::event::{CompletionCallback, EventContext, EventRecord};
use crate::gateway::PublishGateway;
use crate::queue::PriorityQueueSet;
use crate::rate_limiter::limiter_for;
use crate::stats::{Counters, LevelStats, PublisherStats};

/// State shared between producers and the dispatcher
pub(crate) struct Shared {
    /// Reentrant so completion callbacks fired during drain may publish again
    pub(crate) queues: ReentrantMutex<RefCell<PriorityQueueSet>>,
    /// Only flipped while `queues` is locked
    pub(crate) running: AtomicBool,
    /// Bumped on every start, under `queues`; a dispatcher from an older run
    /// stops dispatching
    pub(crate) generation: AtomicU64,
    pub(crate) counters: Counters,
}

impl Shared {
    fn drain(&self) -> usize {
        let guard = self.queues.lock();
        // Records enqueued by callbacks below land in the emptied queues and
        // are left for the dispatcher.
        let pending = guard.borrow_mut().take_all();

        let mut drained = 0;
        for (level, queue) in pending {
            for record in queue {
                debug!(level = level, name = %record.name(), "Cancelling queued event");
                self.counters.completed(level, &PublishStatus::Cancelled);
                record.complete(PublishStatus::Cancelled);
                drained += 1;
            }
            self.counters.dequeued(level, guard.borrow().depth(level).unwrap_or(0));
        }
        drained
    }
}

/// Handle to a spawned dispatcher task
struct DispatcherTask {
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

pub struct BackgroundPublisher {
    config: PublisherConfig,
    gateway: Arc<dyn PublishGateway>,
    shared: Arc<Shared>,
    task: Mutex<Option<DispatcherTask>>,
}

impl BackgroundPublisher {
    pub fn new(config: PublisherConfig, gateway: Arc<dyn PublishGateway>) -> Self {
        let config = config.normalized();
        let queues = PriorityQueueSet::new(config.num_levels, config.max_entries);
        if queues.num_levels() < config.num_levels {
            warn!(
                requested = config.num_levels,
                available = queues.num_levels(),
                "Publisher running with reduced priority levels"
            );
        }

        Self {
            config,
            gateway,
            shared: Arc::new(Shared {
                queues: ReentrantMutex::new(RefCell::new(queues)),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                counters: Counters::default(),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Number of priority levels actually available
    pub fn num_levels(&self) -> usize {
        self.shared.queues.lock().borrow().num_levels()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Enter the running state without spawning a task and return the
    /// dispatcher for the caller to drive. Returns `None` if already running.
    ///
    /// Any dispatcher handed out for an earlier run stops dispatching.
    pub fn start_detached(&self) -> Option<Dispatcher> {
        let generation = {
            let _guard = self.shared.queues.lock();
            if self.shared.running.swap(true, Ordering::SeqCst) {
                warn!("start() called on running publisher");
                return None;
            }
            self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        Some(Dispatcher::new(
            self.shared.clone(),
            generation,
            self.gateway.clone(),
            limiter_for(&self.config.rate_limit),
            self.config.tick_interval(),
        ))
    }

    /// Start the publisher and spawn the dispatcher task.
    ///
    /// Must be called from within a Tokio runtime; outside one the publisher
    /// stays stopped.
    pub fn start(&self) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Cannot start background publisher outside a Tokio runtime");
                return;
            }
        };

        // Held until the task handle is stored so a concurrent stop() sees it
        let _guard = self.shared.queues.lock();
        let Some(dispatcher) = self.start_detached() else {
            return;
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = runtime.spawn(dispatcher.run(shutdown_rx));
        *self.task.lock() = Some(DispatcherTask { shutdown_tx, join });

        info!(
            levels = self.config.num_levels,
            max_entries = self.config.max_entries,
            rate_limit = ?self.config.rate_limit,
            "Background publisher started"
        );
    }

    /// Stop the publisher: wait for the dispatcher to finish its current
    /// tick, then cancel everything still queued
    pub async fn stop(&self) {
        let task = {
            let _guard = self.shared.queues.lock();
            if !self.shared.running.swap(false, Ordering::SeqCst) {
                warn!("stop() called on non-running publisher");
                return;
            }
            self.task.lock().take()
        };

        if let Some(task) = task {
            let _ = task.shutdown_tx.send(());
            if let Err(e) = task.join.await {
                error!(error = %e, "Dispatcher task ended abnormally");
            }
        }

        let drained = self.drain();
        info!(drained = drained, "Background publisher stopped");
    }

    /// Cancel every queued event, returning how many were drained.
    ///
    /// Does not affect the event currently in flight, and does not stop the
    /// dispatcher.
    pub fn drain(&self) -> usize {
        self.shared.drain()
    }

    /// Submit an event, reporting why it was rejected
    pub fn try_publish(
        &self,
        name: &str,
        data: Option<&str>,
        flags: PublishFlags,
        level: usize,
        callback: Option<CompletionCallback>,
        context: Option<EventContext>,
    ) -> Result<(), RejectReason> {
        let result = {
            let guard = self.shared.queues.lock();
            let mut queues = guard.borrow_mut();

            if !self.shared.running.load(Ordering::SeqCst) {
                Err(RejectReason::NotRunning)
            } else {
                queues.check_admission(level).and_then(|()| {
                    let record = EventRecord::new(name, data, flags)
                        .with_callback(callback)
                        .with_context(context);
                    queues.push(level, record)
                })
            }
        };

        match result {
            Ok(depth) => {
                self.shared.counters.accepted(level, depth);
                debug!(level = level, name = %name, depth = depth, "Publish request accepted");
                Ok(())
            }
            Err(reason) => {
                self.shared.counters.rejected(&reason);
                warn!(level = level, name = %name, reason = %reason, "Publish request rejected");
                Err(reason)
            }
        }
    }

    /// Submit an event. Returns `true` if it was queued.
    pub fn publish(
        &self,
        name: &str,
        data: Option<&str>,
        flags: PublishFlags,
        level: usize,
        callback: Option<CompletionCallback>,
        context: Option<EventContext>,
    ) -> bool {
        self.try_publish(name, data, flags, level, callback, context)
            .is_ok()
    }

    pub fn stats(&self) -> PublisherStats {
        let guard = self.shared.queues.lock();
        let running = self.shared.running.load(Ordering::SeqCst);
        let queues = guard.borrow();
        let levels = (0..queues.num_levels())
            .map(|level| LevelStats {
                level,
                depth: queues.depth(level).unwrap_or(0),
                capacity: queues.capacity(),
            })
            .collect();
        self.shared.counters.snapshot(running, levels)
    }
}

impl Drop for BackgroundPublisher {
    fn drop(&mut self) {
        let task = {
            let _guard = self.shared.queues.lock();
            if !self.shared.running.swap(false, Ordering::SeqCst) {
                return;
            }
            self.task.get_mut().take()
        };

        // Dropping the sender ends the dispatcher loop at its next tick
        drop(task);
        let drained = self.shared.drain();
        if drained > 0 {
            warn!(drained = drained, "Publisher dropped while running, queued events cancelled");
        }
    }
}
