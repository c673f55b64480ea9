//! ICE service descriptors and per-routing-class filtering.

use crate::types::session::RoutingClass;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceServiceKind {
    Stun,
    Turn,
    Turns,
}

impl IceServiceKind {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "stun" => Some(Self::Stun),
            "turn" => Some(Self::Turn),
            "turns" => Some(Self::Turns),
            _ => None,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Stun => "stun",
            Self::Turn => "turn",
            Self::Turns => "turns",
        }
    }
}

impl fmt::Display for IceServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// One STUN/TURN endpoint as advertised by the signaling server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServiceDescriptor {
    pub kind: IceServiceKind,
    pub host: String,
    pub port: Option<u16>,
    pub transport: Option<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// ICE server entry in the shape transport engines consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServiceDescriptor {
    /// `stun:host[:port]` or `turn[s]:host[:port][?transport=X]`. UDP is the
    /// default transport and is never spelled out.
    pub fn url(&self) -> String {
        let mut url = format!("{}:{}", self.kind.scheme(), self.host);
        if let Some(port) = self.port {
            url.push_str(&format!(":{port}"));
        }
        if self.kind != IceServiceKind::Stun
            && let Some(transport) = &self.transport
            && transport != "udp"
        {
            url.push_str(&format!("?transport={transport}"));
        }
        url
    }

    pub fn to_ice_server(&self) -> IceServer {
        let relay = self.kind != IceServiceKind::Stun;
        IceServer {
            urls: self.url(),
            username: self.username.clone().filter(|_| relay),
            credential: self.credential.clone().filter(|_| relay),
        }
    }
}

/// Which fetched services each routing class may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IcePolicy {
    /// Relayed sessions get the secure-TURN subset of fetched services.
    pub relay_use_stun_turn: bool,
    /// Peer-to-peer sessions get every fetched service.
    pub p2p_use_stun_turn: bool,
}

impl IcePolicy {
    /// Servers for `routing`, or `None` when the policy leaves that class's
    /// configuration untouched.
    pub fn filter(
        &self,
        routing: RoutingClass,
        services: &[IceServiceDescriptor],
    ) -> Option<Vec<IceServer>> {
        match routing {
            RoutingClass::Relayed if self.relay_use_stun_turn => Some(
                services
                    .iter()
                    .filter(|s| s.kind == IceServiceKind::Turns)
                    .map(IceServiceDescriptor::to_ice_server)
                    .collect(),
            ),
            RoutingClass::PeerToPeer if self.p2p_use_stun_turn => Some(
                services
                    .iter()
                    .map(IceServiceDescriptor::to_ice_server)
                    .collect(),
            ),
            _ => None,
        }
    }
}
