//! HTTP Gateway
//!
//! Posts each event as JSON to a single endpoint. Transport and HTTP failures
//! are mapped onto `GatewayError`; nothing is retried here.

use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use bp_common::{GatewayError, PublishFlags};
use crate::gateway::PublishGateway;

/// HTTP gateway configuration
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Endpoint receiving events
    pub url: String,
    /// Optional Bearer token for authentication
    pub api_token: Option<String>,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/events".to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Request body for one event
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedEvent<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a str>,
    pub flags: PublishFlags,
    pub published_at: DateTime<Utc>,
}

pub struct HttpGateway {
    config: HttpGatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

fn error_for_status(status: reqwest::StatusCode, body: &str) -> GatewayError {
    match status.as_u16() {
        429 => GatewayError::LimitExceeded,
        408 | 504 => GatewayError::Timeout,
        400..=499 => GatewayError::Rejected(format!("HTTP {}: {}", status, body)),
        _ => GatewayError::Transport(format!("HTTP {}: {}", status, body)),
    }
}

fn error_for_transport(e: &reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::NotConnected
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[async_trait]
impl PublishGateway for HttpGateway {
    async fn submit(
        &self,
        name: &str,
        data: Option<&str>,
        flags: PublishFlags,
    ) -> Result<(), GatewayError> {
        let body = PublishedEvent {
            name,
            data,
            flags,
            published_at: Utc::now(),
        };

        debug!(name = %name, url = %self.config.url, "Sending event");

        let mut request = self.client.post(&self.config.url).json(&body);
        if let Some(ref token) = self.config.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| error_for_transport(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        warn!(name = %name, status = %status, "Publish request failed");
        Err(error_for_status(status, &error_body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer, token: Option<&str>) -> HttpGateway {
        HttpGateway::new(HttpGatewayConfig {
            url: format!("{}/events", server.uri()),
            api_token: token.map(String::from),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_posts_event_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "name": "temp",
                "data": "21.5",
                "flags": 1
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server, Some("secret"));
        let result = gateway.submit("temp", Some("21.5"), PublishFlags::PRIVATE).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_status_codes_map_to_gateway_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server, None);
        let result = gateway.submit("temp", None, PublishFlags::PRIVATE).await;
        assert_eq!(result, Err(GatewayError::LimitExceeded));
    }

    #[test]
    fn test_error_for_status() {
        use reqwest::StatusCode;

        assert_eq!(error_for_status(StatusCode::REQUEST_TIMEOUT, ""), GatewayError::Timeout);
        assert_eq!(error_for_status(StatusCode::GATEWAY_TIMEOUT, ""), GatewayError::Timeout);
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, "bad name"),
            GatewayError::Rejected(msg) if msg.contains("bad name")
        ));
        assert!(matches!(
            error_for_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            GatewayError::Transport(_)
        ));
    }
}
