//! Event Record - one accepted publish request
//!
//! Records own bounded copies of the caller's name and data. A record is
//! consumed exactly once, either by the dispatcher or by drain, and its
//! completion callback fires at that point.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::error;

use bp_common::{
    truncate_bounded, PublishFlags, PublishStatus, MAX_EVENT_DATA_LENGTH, MAX_EVENT_NAME_LENGTH,
};

/// Caller-owned value handed back to the completion callback
pub type EventContext = Arc<dyn Any + Send + Sync>;

/// Completion callback: `(status, name, data, context)`
pub type CompletionCallback =
    Box<dyn FnOnce(&PublishStatus, &str, Option<&str>, Option<&EventContext>) + Send + 'static>;

pub struct EventRecord {
    name: String,
    data: Option<String>,
    flags: PublishFlags,
    callback: Option<CompletionCallback>,
    context: Option<EventContext>,
}

impl EventRecord {
    pub fn new(name: &str, data: Option<&str>, flags: PublishFlags) -> Self {
        Self {
            name: truncate_bounded(name, MAX_EVENT_NAME_LENGTH),
            data: data.map(|d| truncate_bounded(d, MAX_EVENT_DATA_LENGTH)),
            flags,
            callback: None,
            context: None,
        }
    }

    pub fn with_callback(mut self, callback: Option<CompletionCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_context(mut self, context: Option<EventContext>) -> Self {
        self.context = context;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn flags(&self) -> PublishFlags {
        self.flags
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Deliver the final outcome, consuming the record.
    ///
    /// Without a callback, failures are logged and everything else is dropped
    /// silently.
    pub(crate) fn complete(self, status: PublishStatus) {
        match self.callback {
            Some(callback) => {
                callback(&status, &self.name, self.data.as_deref(), self.context.as_ref());
            }
            None => {
                if let PublishStatus::Failure(ref e) = status {
                    error!(name = %self.name, error = %e, "Publish failed");
                }
            }
        }
    }
}

impl fmt::Debug for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecord")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("flags", &self.flags)
            .field("has_callback", &self.callback.is_some())
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
