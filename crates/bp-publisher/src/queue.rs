//! Priority Queue Set - one bounded FIFO per priority level

use std::collections::VecDeque;
use tracing::warn;

use crate::error::RejectReason;
use crate::event::EventRecord;

#[derive(Debug)]
pub struct PriorityQueueSet {
    levels: Vec<VecDeque<EventRecord>>,
    max_entries: usize,
}

impl PriorityQueueSet {
    /// Create `num_levels` queues of `max_entries` each.
    ///
    /// If storage for a level cannot be reserved, the set keeps the levels
    /// already created (at least one) instead of failing.
    pub fn new(num_levels: usize, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        let mut levels = Vec::with_capacity(num_levels.max(1));

        for level in 0..num_levels.max(1) {
            let mut queue = VecDeque::new();
            if queue.try_reserve_exact(max_entries).is_err() {
                warn!(
                    requested = num_levels,
                    created = level,
                    "Failed to reserve queue storage, running with fewer levels"
                );
                break;
            }
            levels.push(queue);
        }

        if levels.is_empty() {
            levels.push(VecDeque::new());
        }

        Self { levels, max_entries }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn depth(&self, level: usize) -> Option<usize> {
        self.levels.get(level).map(VecDeque::len)
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(VecDeque::is_empty)
    }

    /// Check whether a record could be appended at `level` right now
    pub fn check_admission(&self, level: usize) -> Result<(), RejectReason> {
        let queue = self.levels.get(level).ok_or(RejectReason::InvalidPriority {
            level,
            levels: self.levels.len(),
        })?;

        if queue.len() >= self.max_entries {
            return Err(RejectReason::QueueFull {
                level,
                capacity: self.max_entries,
            });
        }

        Ok(())
    }

    /// Append to the tail of `level`, returning the new depth
    pub fn push(&mut self, level: usize, record: EventRecord) -> Result<usize, RejectReason> {
        self.check_admission(level)?;
        let queue = &mut self.levels[level];
        queue.push_back(record);
        Ok(queue.len())
    }

    /// Remove the head of the first non-empty level, scanning from level 0
    pub fn pop_highest(&mut self) -> Option<(usize, EventRecord)> {
        self.levels
            .iter_mut()
            .enumerate()
            .find_map(|(level, queue)| queue.pop_front().map(|record| (level, record)))
    }

    /// Take every queued record, highest priority level first, leaving all
    /// levels empty
    pub fn take_all(&mut self) -> Vec<(usize, VecDeque<EventRecord>)> {
        self.levels
            .iter_mut()
            .enumerate()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(level, queue)| (level, std::mem::take(queue)))
            .collect()
    }
}
