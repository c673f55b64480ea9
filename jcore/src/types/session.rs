use crate::jid::Jid;
use rand::RngCore;
use serde::Serialize;
use std::fmt;

/// Opaque identifier of one Jingle negotiation (`sid` attribute).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates an unguessable identifier from 16 random bytes.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Initiator,
    Responder,
}

/// Whether media flows directly between the peers or through the media relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingClass {
    PeerToPeer,
    Relayed,
}

impl RoutingClass {
    /// Classifies a remote party: it is the relay only when its resource is
    /// exactly `relay_resource`.
    pub fn classify(remote: &Jid, relay_resource: &str) -> Self {
        if remote.resource() == Some(relay_resource) {
            Self::Relayed
        } else {
            Self::PeerToPeer
        }
    }

    pub fn is_p2p(&self) -> bool {
        matches!(self, Self::PeerToPeer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    #[default]
    Pending,
    Active,
    Ended,
}

impl SessionState {
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Why a session ended, as carried by a `<reason>` element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TerminationReason {
    pub condition: Option<String>,
    pub text: Option<String>,
}

impl TerminationReason {
    pub fn new(condition: impl Into<String>, text: Option<String>) -> Self {
        Self {
            condition: Some(condition.into()),
            text,
        }
    }

    pub fn success() -> Self {
        Self::new("success", None)
    }
}
