//! Per-stanza acknowledgements.
//!
//! Every inbound Jingle IQ gets exactly one reply: an empty `result`, or an
//! `error` naming why it was rejected.

use super::{NS_JINGLE_ERRORS, NS_STANZAS};
use crate::jid::Jid;
use crate::types::session::SessionId;
use crate::xml::{Node, NodeBuilder};
use std::fmt;

/// Why an inbound stanza was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckErrorKind {
    /// The sid is not in the registry and the action does not open a session.
    UnknownSession,
    /// The sid is known but the sender is not the session's remote party.
    SenderMismatch,
    /// A session-initiate reused a live sid.
    DuplicateSession,
    /// The action is not one this endpoint handles.
    UnsupportedAction,
    /// The stanza could not be parsed as a Jingle IQ.
    MalformedRequest,
}

impl AckErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownSession => "unknown-session",
            Self::SenderMismatch => "sender-mismatch",
            Self::DuplicateSession => "duplicate-session",
            Self::UnsupportedAction => "unsupported-action",
            Self::MalformedRequest => "malformed-request",
        }
    }

    /// XMPP stanza error condition used on the wire.
    pub fn stanza_condition(&self) -> &'static str {
        match self {
            Self::UnknownSession | Self::SenderMismatch => "item-not-found",
            Self::DuplicateSession => "service-unavailable",
            Self::UnsupportedAction | Self::MalformedRequest => "bad-request",
        }
    }

    /// Whether the Jingle-specific `<unknown-session/>` condition is added.
    /// A sender mismatch is reported exactly like an unknown session so the
    /// sender learns nothing about sessions it is not part of.
    fn is_unknown_session(&self) -> bool {
        matches!(self, Self::UnknownSession | Self::SenderMismatch)
    }
}

impl fmt::Display for AckErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Ok,
    Error(AckErrorKind),
}

/// One acknowledgement, addressed back to the sender of the stanza it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub stanza_id: String,
    pub to: Jid,
    pub sid: Option<SessionId>,
    pub outcome: AckOutcome,
}

impl Ack {
    pub fn ok(stanza_id: impl Into<String>, to: Jid, sid: SessionId) -> Self {
        Self {
            stanza_id: stanza_id.into(),
            to,
            sid: Some(sid),
            outcome: AckOutcome::Ok,
        }
    }

    pub fn error(
        stanza_id: impl Into<String>,
        to: Jid,
        sid: Option<SessionId>,
        kind: AckErrorKind,
    ) -> Self {
        Self {
            stanza_id: stanza_id.into(),
            to,
            sid,
            outcome: AckOutcome::Error(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, AckOutcome::Ok)
    }

    pub fn error_kind(&self) -> Option<AckErrorKind> {
        match self.outcome {
            AckOutcome::Ok => None,
            AckOutcome::Error(kind) => Some(kind),
        }
    }

    pub fn to_node(&self) -> Node {
        match self.outcome {
            AckOutcome::Ok => build_ack_result(&self.stanza_id, &self.to),
            AckOutcome::Error(kind) => build_ack_error(&self.stanza_id, &self.to, kind),
        }
    }
}

pub fn build_ack_result(stanza_id: &str, to: &Jid) -> Node {
    NodeBuilder::new("iq")
        .attr("type", "result")
        .attr("to", to.to_string())
        .attr("id", stanza_id)
        .build()
}

pub fn build_ack_error(stanza_id: &str, to: &Jid, kind: AckErrorKind) -> Node {
    let mut conditions = vec![
        NodeBuilder::new(kind.stanza_condition())
            .attr("xmlns", NS_STANZAS)
            .build(),
    ];
    if kind.is_unknown_session() {
        conditions.push(
            NodeBuilder::new("unknown-session")
                .attr("xmlns", NS_JINGLE_ERRORS)
                .build(),
        );
    }

    NodeBuilder::new("iq")
        .attr("type", "error")
        .attr("to", to.to_string())
        .attr("id", stanza_id)
        .children([NodeBuilder::new("error")
            .attr("type", "cancel")
            .children(conditions)
            .build()])
        .build()
}
