//! Interfaces of the collaborators the dispatcher drives.

use super::error::TransportError;
use async_trait::async_trait;
use jcore::ice::IceServer;
use jcore::types::events::SessionMeta;
use jcore::types::session::SessionId;
use jcore::xml::Node;

/// The media transport / ICE engine. It owns offer/answer application;
/// this crate only tells it what arrived.
#[async_trait]
pub trait TransportEngine: Send + Sync {
    /// Called once when a session is created, with the ICE servers
    /// snapshotted for its routing class.
    fn configure_session(&self, meta: &SessionMeta, ice_servers: &[IceServer]);

    /// Applies a renegotiated remote offer (transport-replace). This is the
    /// only suspension point of the signaling path.
    async fn apply_offer(&self, sid: &SessionId, contents: Vec<Node>) -> Result<(), TransportError>;

    fn apply_answer(&self, sid: &SessionId, contents: &[Node]) -> Result<(), TransportError>;

    fn add_remote_sources(&self, sid: &SessionId, contents: &[Node]) -> Result<(), TransportError>;

    fn remove_remote_sources(&self, sid: &SessionId, contents: &[Node])
    -> Result<(), TransportError>;

    /// Trickled transport information (candidates) for the session.
    fn transport_info(&self, sid: &SessionId, jingle: &Node) -> Result<(), TransportError>;

    /// Contents describing the local transport to put in a transport-reject.
    fn reject_transport(&self, sid: &SessionId) -> Vec<Node>;
}

/// Delivers stanzas to the wire.
#[async_trait]
pub trait StanzaSender: Send + Sync {
    async fn send_node(&self, node: Node) -> Result<(), anyhow::Error>;
}

/// One named analytics sample.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub name: &'static str,
    /// Milliseconds since the dispatcher started.
    pub value: f64,
    pub p2p: bool,
}

/// Fire-and-forget telemetry. Errors are dropped by the caller.
pub trait AnalyticsSink: Send + Sync {
    fn send_event(&self, event: AnalyticsEvent) -> Result<(), anyhow::Error>;
}

/// Sink used when no analytics backend is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn send_event(&self, _event: AnalyticsEvent) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
