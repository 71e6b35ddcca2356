use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

// ============================================================================
// Event Bounds
// ============================================================================

/// Maximum stored length of an event name, in bytes
pub const MAX_EVENT_NAME_LENGTH: usize = 64;

/// Maximum stored length of event data, in bytes
pub const MAX_EVENT_DATA_LENGTH: usize = 1024;

/// Copy `input` into an owned string of at most `max_len` bytes.
///
/// Overlong input is cut at the last UTF-8 character boundary that fits, so the
/// same input always yields the same stored value.
pub fn truncate_bounded(input: &str, max_len: usize) -> String {
    if input.len() <= max_len {
        return input.to_string();
    }

    let mut end = max_len;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    input[..end].to_string()
}

// ============================================================================
// Publish Flags
// ============================================================================

/// Opaque publish options handed through to the gateway untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishFlags(u8);

impl PublishFlags {
    pub const PUBLIC: PublishFlags = PublishFlags(0x0);
    pub const PRIVATE: PublishFlags = PublishFlags(0x1);
    pub const NO_ACK: PublishFlags = PublishFlags(0x2);
    pub const WITH_ACK: PublishFlags = PublishFlags(0x8);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: PublishFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for PublishFlags {
    fn default() -> Self {
        Self::PRIVATE
    }
}

impl BitOr for PublishFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PublishFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ============================================================================
// Completion Types
// ============================================================================

/// Failure reported by a publish gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Publish rate limit exceeded")]
    LimitExceeded,

    #[error("Publish timed out")]
    Timeout,

    #[error("Not connected to the remote service")]
    NotConnected,

    #[error("Publish rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Outcome delivered to an event's completion callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// The gateway accepted the event
    Success,
    /// The gateway reported a failure; the event is not retried
    Failure(GatewayError),
    /// The event was drained from its queue before being dispatched
    Cancelled,
}

impl PublishStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishStatus::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PublishStatus::Failure(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PublishStatus::Cancelled)
    }
}

impl From<Result<(), GatewayError>> for PublishStatus {
    fn from(outcome: Result<(), GatewayError>) -> Self {
        match outcome {
            Ok(()) => PublishStatus::Success,
            Err(e) => PublishStatus::Failure(e),
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStatus::Success => write!(f, "success"),
            PublishStatus::Failure(e) => write!(f, "failure: {}", e),
            PublishStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}
