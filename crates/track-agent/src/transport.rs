//! Delivery of a batch to the ingestion endpoint.

use crate::config::AgentConfig;
use crate::error::{AgentError, TransportError};
use crate::record::EventRecord;
use async_trait::async_trait;

/// Sends one batch and reports whether the server acknowledged it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &[EventRecord]) -> Result<(), TransportError>;
}

/// `POST <endpoint>` with the batch as a JSON array.
///
/// No request timeout is configured; the platform defaults apply.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        Ok(HttpTransport {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Transport posting to `config.endpoint`
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        Self::new(config.endpoint.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &[EventRecord]) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(batch)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    TransportError::Encode(e.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            Err(TransportError::Rejected)
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let transport = HttpTransport::new("http://127.0.0.1:9/track").unwrap();
        let batch = vec![EventRecord::with_ts("click", vec![], "http://a", "t", 1)];
        let err = transport.send(&batch).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_from_config_uses_configured_endpoint() {
        let config = AgentConfig::default().with_endpoint("http://127.0.0.1:8888/track");
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.endpoint(), "http://127.0.0.1:8888/track");
    }
}
