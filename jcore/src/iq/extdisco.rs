//! External service discovery (XEP-0215) IQ specification.
//!
//! Wire format:
//! ```xml
//! <!-- Request -->
//! <iq type="get" to="meet.example.com" id="...">
//!   <services xmlns="urn:xmpp:extdisco:1"/>
//! </iq>
//!
//! <!-- Response -->
//! <iq type="result" from="meet.example.com" id="...">
//!   <services xmlns="urn:xmpp:extdisco:1">
//!     <service type="stun" host="stun.example.com" port="3478"/>
//!     <service type="turns" host="turn.example.com" port="443" transport="tcp"
//!              username="1700000000:alice" password="secret"/>
//!   </services>
//! </iq>
//! ```

use super::{InfoQuery, IqSpec};
use crate::ice::{IceServiceDescriptor, IceServiceKind};
use crate::jid::Jid;
use crate::xml::{Node, NodeBuilder};
use anyhow::anyhow;
use log::debug;

pub const NS_EXTDISCO: &str = "urn:xmpp:extdisco:1";

#[derive(Debug, Clone)]
pub struct ExtDiscoSpec {
    domain: Jid,
}

impl ExtDiscoSpec {
    pub fn new(domain: Jid) -> Self {
        Self { domain }
    }
}

impl IqSpec for ExtDiscoSpec {
    type Response = Vec<IceServiceDescriptor>;

    fn build_iq(&self) -> InfoQuery {
        InfoQuery::get(
            self.domain.clone(),
            NodeBuilder::new("services").attr("xmlns", NS_EXTDISCO).build(),
        )
    }

    fn parse_response(&self, response: &Node) -> Result<Self::Response, anyhow::Error> {
        let services = response
            .get_optional_child("services")
            .ok_or_else(|| anyhow!("Missing services node in response"))?;

        let mut descriptors = Vec::new();
        for service in services.get_children_by_tag("service") {
            let mut attrs = service.attrs();
            let Some(kind) = attrs
                .optional_string("type")
                .and_then(IceServiceKind::from_wire)
            else {
                debug!(target: "Jingle/Ice", "Skipping non-ICE service: {}", service);
                continue;
            };
            let host = attrs.string("host");
            if host.is_empty() {
                debug!(target: "Jingle/Ice", "Skipping service without host");
                continue;
            }
            let port = attrs
                .optional_u64("port")
                .and_then(|p| u16::try_from(p).ok());

            descriptors.push(IceServiceDescriptor {
                kind,
                host,
                port,
                transport: attrs.optional_string("transport").map(str::to_string),
                username: attrs.optional_string("username").map(str::to_string),
                credential: attrs.optional_string("password").map(str::to_string),
            });
        }

        Ok(descriptors)
    }
}
