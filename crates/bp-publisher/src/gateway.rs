//! Publisher Gateway - the outbound publish call
//!
//! The dispatcher awaits exactly one `submit` per event and never retries.
//! Timeouts, if any, belong to the gateway implementation.

use async_trait::async_trait;
use tracing::info;

use bp_common::{GatewayError, PublishFlags};

#[async_trait]
pub trait PublishGateway: Send + Sync {
    async fn submit(
        &self,
        name: &str,
        data: Option<&str>,
        flags: PublishFlags,
    ) -> Result<(), GatewayError>;
}

/// Gateway that logs each event and reports success
#[derive(Debug, Default, Clone)]
pub struct LoggingGateway;

#[async_trait]
impl PublishGateway for LoggingGateway {
    async fn submit(
        &self,
        name: &str,
        data: Option<&str>,
        flags: PublishFlags,
    ) -> Result<(), GatewayError> {
        info!(name = %name, data = ?data, flags = flags.bits(), "Published event");
        Ok(())
    }
}
