//! Request/response IQ abstractions.
//!
//! Protocol-level IQ logic (building the request, parsing the response)
//! lives here; sending, waiting and timeouts belong to the runtime crate.

pub mod extdisco;

use crate::jid::Jid;
use crate::xml::{Node, NodeBuilder};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoQueryType {
    Set,
    Get,
}

impl InfoQueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoQueryType::Set => "set",
            InfoQueryType::Get => "get",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InfoQuery {
    pub query_type: InfoQueryType,
    pub to: Jid,
    pub id: Option<String>,
    /// Namespaced query child, e.g. `<services xmlns="urn:xmpp:extdisco:1"/>`.
    pub payload: Node,
    pub timeout: Option<Duration>,
}

impl InfoQuery {
    pub fn get(to: Jid, payload: Node) -> Self {
        Self {
            query_type: InfoQueryType::Get,
            to,
            id: None,
            payload,
            timeout: None,
        }
    }

    pub fn set(to: Jid, payload: Node) -> Self {
        Self {
            query_type: InfoQueryType::Set,
            ..Self::get(to, payload)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Renders the `<iq>` stanza using `id` as the request id.
    pub fn to_node(&self, id: &str) -> Node {
        NodeBuilder::new("iq")
            .attr("type", self.query_type.as_str())
            .attr("to", self.to.to_string())
            .attr("id", id)
            .children([self.payload.clone()])
            .build()
    }
}

/// A reusable IQ specification that pairs a request builder with a response parser.
pub trait IqSpec {
    /// The output type produced by parsing the IQ response.
    type Response;

    /// Build the IQ stanza for this spec.
    fn build_iq(&self) -> InfoQuery;

    /// Parse the IQ response node into the typed response.
    fn parse_response(&self, response: &Node) -> Result<Self::Response, anyhow::Error>;
}
