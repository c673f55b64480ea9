use crate::jid::Jid;
use crate::types::session::{Role, RoutingClass, SessionId, TerminationReason};
use crate::xml::Node;
use std::sync::{Arc, PoisonError, RwLock};

/// Identity of the session an event refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMeta {
    pub sid: SessionId,
    pub local: Jid,
    pub remote: Jid,
    pub role: Role,
    pub routing: RoutingClass,
}

#[derive(Debug, Clone)]
pub struct IncomingCall {
    pub meta: SessionMeta,
    /// `<content>` children of the session-initiate.
    pub contents: Vec<Node>,
    /// Milliseconds since the dispatcher started, when the offer arrived.
    pub received_at_ms: f64,
}

#[derive(Debug, Clone)]
pub struct CallAccepted {
    pub meta: SessionMeta,
    pub contents: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct CallEnded {
    pub meta: SessionMeta,
    pub reason: TerminationReason,
}

#[derive(Debug, Clone)]
pub struct RenegotiationOutcome {
    pub meta: SessionMeta,
    pub epoch: u64,
    /// Engine error text when the renegotiation failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteSources {
    pub meta: SessionMeta,
    pub contents: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartMuted {
    pub audio: bool,
    pub video: bool,
}

/// Events surfaced to collaborators (conference logic, UI, analytics glue).
#[derive(Debug, Clone)]
pub enum Event {
    IncomingCall(IncomingCall),
    CallAccepted(CallAccepted),
    CallEnded(CallEnded),
    TransportRenegotiationSucceeded(RenegotiationOutcome),
    TransportRenegotiationFailed(RenegotiationOutcome),
    RemoteSourcesAdded(RemoteSources),
    RemoteSourcesRemoved(RemoteSources),
    StartMutedState {
        sid: SessionId,
        state: StartMuted,
    },
    /// An internal inconsistency forced a session down.
    JingleFatalError {
        sid: SessionId,
        reason: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IncomingCall(_) => "incoming-call",
            Self::CallAccepted(_) => "call-accepted",
            Self::CallEnded(_) => "call-ended",
            Self::TransportRenegotiationSucceeded(_) => "transport-renegotiation-succeeded",
            Self::TransportRenegotiationFailed(_) => "transport-renegotiation-failed",
            Self::RemoteSourcesAdded(_) => "remote-sources-added",
            Self::RemoteSourcesRemoved(_) => "remote-sources-removed",
            Self::StartMutedState { .. } => "start-muted-state",
            Self::JingleFatalError { .. } => "jingle-fatal-error",
        }
    }
}

pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &Event);
}

#[derive(Default, Clone)]
pub struct CoreEventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl CoreEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Returns true if there are any event handlers registered.
    pub fn has_handlers(&self) -> bool {
        !self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn dispatch(&self, event: &Event) {
        for handler in self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            handler.handle_event(event);
        }
    }
}
