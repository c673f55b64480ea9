use crate::config::JingleConfig;
use async_trait::async_trait;
use jcore::iq::{InfoQuery, IqSpec};
use jcore::xml::Node;
use log::warn;
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Custom error types for IQ operations.
#[derive(Debug, Error)]
pub enum IqError {
    #[error("IQ request timed out")]
    Timeout,
    #[error("Received a server error response: code={code}, text='{text}'")]
    ServerError { code: u16, text: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to parse IQ response: {0}")]
    Parse(String),
}

/// Sends one `<iq>` and resolves with the matching response stanza.
#[async_trait]
pub trait IqSender: Send + Sync {
    async fn send_iq(&self, node: Node) -> Result<Node, IqError>;
}

/// Request ids, timeouts and error-response mapping on top of an [`IqSender`].
pub struct IqClient {
    sender: Arc<dyn IqSender>,
    unique_id: String,
    id_counter: AtomicU64,
    default_timeout: Duration,
}

impl IqClient {
    pub fn new(sender: Arc<dyn IqSender>, default_timeout: Duration) -> Self {
        let mut prefix = [0u8; 4];
        rand::rng().fill_bytes(&mut prefix);
        Self {
            sender,
            unique_id: hex::encode(prefix),
            id_counter: AtomicU64::new(0),
            default_timeout,
        }
    }

    /// Client whose default timeout is `config.iq_timeout()`.
    pub fn from_config(sender: Arc<dyn IqSender>, config: &JingleConfig) -> Self {
        Self::new(sender, config.iq_timeout())
    }

    /// Generates a new unique request ID string.
    pub fn generate_request_id(&self) -> String {
        let count = self.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.unique_id, count)
    }

    /// Sends an IQ (Info/Query) stanza and waits for its response.
    pub async fn send_iq(&self, query: InfoQuery) -> Result<Node, IqError> {
        let req_id = query
            .id
            .clone()
            .unwrap_or_else(|| self.generate_request_id());
        let node = query.to_node(&req_id);

        let response = match timeout(
            query.timeout.unwrap_or(self.default_timeout),
            self.sender.send_iq(node),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(IqError::Timeout),
        };

        if response.get_attr("type") == Some("error") {
            let error = response.get_optional_child("error");
            let code = error
                .and_then(|e| e.get_attr("code"))
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            let text = error
                .and_then(|e| e.children())
                .and_then(|c| c.first())
                .map(|c| c.tag.clone())
                .unwrap_or_default();
            warn!("IQ {req_id} failed: code={code} text={text}");
            return Err(IqError::ServerError { code, text });
        }
        Ok(response)
    }

    /// Builds, sends and parses a typed [`IqSpec`] request.
    pub async fn execute<S: IqSpec + Sync>(&self, spec: &S) -> Result<S::Response, IqError> {
        let response = self.send_iq(spec.build_iq()).await?;
        spec.parse_response(&response)
            .map_err(|e| IqError::Parse(e.to_string()))
    }
}
