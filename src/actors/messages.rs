use crate::jingle::error::SessionError;
use crate::jingle::session::SessionSnapshot;
use jcore::jid::Jid;
use jcore::types::session::{SessionId, TerminationReason};
use jcore::xml::Node;
use tokio::sync::oneshot;

// --- Messages for SignalingActor ---
#[derive(Debug)]
pub enum SignalingCommand {
    /// A stanza received from the wire.
    Inbound(Node),
    OpenSession {
        local: Jid,
        remote: Jid,
        /// Contents for the session-initiate, sent right after creation.
        contents: Vec<Node>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    AcceptSession {
        sid: SessionId,
        contents: Vec<Node>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    TerminateSession {
        sid: SessionId,
        reason: TerminationReason,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<SessionSnapshot>>,
    },
    Shutdown,
}
