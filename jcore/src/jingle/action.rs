//! Jingle action vocabulary.
//!
//! Each `<jingle>` element carries exactly one `action` attribute. Two
//! historical spellings exist for adding and removing media sources
//! (`addsource`/`removesource`); they are accepted on decode and collapse to
//! the same action. Outbound stanzas always use the canonical spelling.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JingleAction {
    /// Opens a session. Carries the initial content description.
    SessionInitiate,
    /// Responder confirms it participates.
    SessionAccept,
    /// Changes content parameters (e.g. `senders`) on a live session.
    ContentModify,
    /// Trickled transport information (ICE candidates).
    TransportInfo,
    /// Mid-call renegotiation of the transport.
    TransportReplace,
    /// Rejection of a transport-replace.
    TransportReject,
    /// Ends the session. May carry a `<reason>`.
    SessionTerminate,
    /// Adds remote media sources.
    SourceAdd,
    /// Removes remote media sources.
    SourceRemove,
}

impl JingleAction {
    pub const ALL: [JingleAction; 9] = [
        Self::SessionInitiate,
        Self::SessionAccept,
        Self::ContentModify,
        Self::TransportInfo,
        Self::TransportReplace,
        Self::TransportReject,
        Self::SessionTerminate,
        Self::SourceAdd,
        Self::SourceRemove,
    ];

    /// Canonical wire spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SessionInitiate => "session-initiate",
            Self::SessionAccept => "session-accept",
            Self::ContentModify => "content-modify",
            Self::TransportInfo => "transport-info",
            Self::TransportReplace => "transport-replace",
            Self::TransportReject => "transport-reject",
            Self::SessionTerminate => "session-terminate",
            Self::SourceAdd => "source-add",
            Self::SourceRemove => "source-remove",
        }
    }

    pub fn from_wire(action: &str) -> Option<Self> {
        match action {
            "session-initiate" => Some(Self::SessionInitiate),
            "session-accept" => Some(Self::SessionAccept),
            "content-modify" => Some(Self::ContentModify),
            "transport-info" => Some(Self::TransportInfo),
            "transport-replace" => Some(Self::TransportReplace),
            "transport-reject" => Some(Self::TransportReject),
            "session-terminate" => Some(Self::SessionTerminate),
            "source-add" | "addsource" => Some(Self::SourceAdd),
            "source-remove" | "removesource" => Some(Self::SourceRemove),
            _ => None,
        }
    }

    /// Whether this action opens a new session rather than addressing one.
    pub fn opens_session(&self) -> bool {
        matches!(self, Self::SessionInitiate)
    }
}

impl fmt::Display for JingleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
