//! Background Publish Relay
//!
//! Reads events from stdin, one per line, as `<level> <name> [data...]`, and
//! publishes them through a background publisher. Queued events are cancelled
//! on EOF or shutdown signal.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BP_NUM_LEVELS` | `2` | Number of priority levels |
//! | `BP_MAX_ENTRIES` | `8` | Max queued events per level |
//! | `BP_INTERVAL_MS` | `1000` | Rate limit interval in milliseconds |
//! | `BP_BURST` | `2` | Dispatches allowed per interval (`1` = fixed interval) |
//! | `BP_TICK_MS` | `2` | Dispatcher tick in milliseconds |
//! | `BP_GATEWAY_URL` | - | HTTP endpoint; events are only logged when unset |
//! | `BP_GATEWAY_TOKEN` | - | Bearer token for the HTTP endpoint |
//! | `BP_REQUEST_TIMEOUT_MS` | `30000` | HTTP request timeout |
//! | `RUST_LOG` | `info` | Log level |

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bp_common::{PublishFlags, PublishStatus};
use bp_publisher::{
    BackgroundPublisher, CompletionCallback, EventContext, HttpGateway, HttpGatewayConfig,
    LoggingGateway, PublishGateway, PublisherConfig, RateLimitConfig,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn publisher_config_from_env() -> PublisherConfig {
    let interval_ms: u64 = env_or_parse("BP_INTERVAL_MS", 1000);
    let burst: usize = env_or_parse("BP_BURST", 2);

    let rate_limit = if burst <= 1 {
        RateLimitConfig::FixedInterval { interval_ms }
    } else {
        RateLimitConfig::Burst { interval_ms, burst }
    };

    PublisherConfig {
        num_levels: env_or_parse("BP_NUM_LEVELS", 2),
        max_entries: env_or_parse("BP_MAX_ENTRIES", 8),
        rate_limit,
        tick_interval_ms: env_or_parse("BP_TICK_MS", 2),
    }
}

fn gateway_from_env() -> Result<Arc<dyn PublishGateway>> {
    let url = env_or("BP_GATEWAY_URL", "");
    if url.is_empty() {
        info!("BP_GATEWAY_URL not set, events will only be logged");
        return Ok(Arc::new(LoggingGateway));
    }

    let gateway = HttpGateway::new(HttpGatewayConfig {
        url,
        api_token: std::env::var("BP_GATEWAY_TOKEN").ok(),
        request_timeout: Duration::from_millis(env_or_parse("BP_REQUEST_TIMEOUT_MS", 30_000)),
        ..Default::default()
    })?;
    info!("HTTP gateway initialized: {}", gateway.url());
    Ok(Arc::new(gateway))
}

/// One parsed input line
#[derive(Debug, PartialEq, Eq)]
struct InputEvent<'a> {
    level: usize,
    name: &'a str,
    data: Option<&'a str>,
}

fn parse_line(line: &str) -> Result<InputEvent<'_>> {
    let line = line.trim();
    let (level, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| anyhow::anyhow!("expected `<level> <name> [data]`, got {:?}", line))?;
    let level: usize = level
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid priority level {:?}", level))?;

    let rest = rest.trim_start();
    let (name, data) = match rest.split_once(char::is_whitespace) {
        Some((name, data)) => (name, Some(data.trim_start()).filter(|d| !d.is_empty())),
        None => (rest, None),
    };

    Ok(InputEvent { level, name, data })
}

fn completion_logger() -> CompletionCallback {
    Box::new(
        |status: &PublishStatus, name: &str, _data: Option<&str>, _context: Option<&EventContext>| {
            match status {
                PublishStatus::Success => info!(name = %name, "Event published"),
                PublishStatus::Failure(e) => warn!(name = %name, error = %e, "Event publish failed"),
                PublishStatus::Cancelled => warn!(name = %name, "Event cancelled before publish"),
            }
        },
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Background Publish Relay");

    let config = publisher_config_from_env();
    let gateway = gateway_from_env()?;
    let publisher = BackgroundPublisher::new(config, gateway);
    publisher.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(event) => {
                        publisher.publish(
                            event.name,
                            event.data,
                            PublishFlags::PRIVATE,
                            event.level,
                            Some(completion_logger()),
                            None,
                        );
                    }
                    Err(e) => warn!(error = %e, "Skipping input line"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received...");
                break;
            }
        }
    }

    publisher.stop().await;
    println!("{}", serde_json::to_string_pretty(&publisher.stats())?);

    info!("Background Publish Relay shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_with_data() {
        let event = parse_line("0 temperature 21.5 C").unwrap();
        assert_eq!(
            event,
            InputEvent { level: 0, name: "temperature", data: Some("21.5 C") }
        );
    }

    #[test]
    fn test_parse_line_without_data() {
        let event = parse_line("  1   heartbeat  ").unwrap();
        assert_eq!(event, InputEvent { level: 1, name: "heartbeat", data: None });
    }

    #[test]
    fn test_parse_line_rejects_bad_input() {
        assert!(parse_line("heartbeat").is_err());
        assert!(parse_line("high heartbeat").is_err());
    }

    #[test]
    fn test_burst_of_one_uses_fixed_interval() {
        std::env::set_var("BP_BURST", "1");
        std::env::set_var("BP_INTERVAL_MS", "250");
        let config = publisher_config_from_env();
        std::env::remove_var("BP_BURST");
        std::env::remove_var("BP_INTERVAL_MS");

        assert_eq!(config.rate_limit, RateLimitConfig::FixedInterval { interval_ms: 250 });
    }
}
