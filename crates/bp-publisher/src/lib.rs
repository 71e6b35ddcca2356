//! Background Publish
//!
//! Decouples event producers from a single-concurrency outbound publish
//! channel:
//! - BackgroundPublisher: submission API and start/stop/drain lifecycle
//! - PriorityQueueSet: bounded FIFO per priority level, level 0 first
//! - Dispatcher: one task, one gateway call in flight, strict priority
//! - DispatchLimiter: fixed-interval and burst rate limiting
//! - PublishGateway: the outbound call (HTTP and logging implementations)

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gateway;
pub mod http_gateway;
pub mod publisher;
pub mod queue;
pub mod rate_limiter;
pub mod stats;

pub use config::{PublisherConfig, RateLimitConfig};
pub use dispatcher::{Dispatcher, TickOutcome};
pub use error::RejectReason;
pub use event::{CompletionCallback, EventContext, EventRecord};
pub use gateway::{LoggingGateway, PublishGateway};
pub use http_gateway::{HttpGateway, HttpGatewayConfig};
pub use publisher::BackgroundPublisher;
pub use queue::PriorityQueueSet;
pub use rate_limiter::{BurstLimiter, DispatchLimiter, FixedIntervalLimiter};
pub use stats::{LevelStats, PublisherStats};

// Re-export shared value types
pub use bp_common::{GatewayError, PublishFlags, PublishStatus};
