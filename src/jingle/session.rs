//! Per-peer Jingle session state machine.

use chrono::{DateTime, Utc};
use jcore::ice::IceServer;
use jcore::jid::Jid;
use jcore::types::events::SessionMeta;
use jcore::types::session::{Role, RoutingClass, SessionId, SessionState, TerminationReason};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// State transitions for sessions.
#[derive(Debug, Clone)]
pub enum SessionTransition {
    /// The responder's session-accept reached the initiator.
    RemoteAccepted,
    /// The local responder accepted an incoming session.
    LocalAccepted,
    /// Either party ended the session, or a fatal error forced it down.
    Terminated { reason: TerminationReason },
}

#[derive(Debug, Clone, Error)]
#[error("invalid transition {attempted} in state {current_state} (role {role:?})")]
pub struct InvalidTransition {
    pub current_state: SessionState,
    pub role: Role,
    pub attempted: String,
}

/// One negotiated call with a single remote party.
#[derive(Debug, Clone)]
pub struct JingleSession {
    meta: SessionMeta,
    state: SessionState,
    negotiation_epoch: u64,
    /// Last renegotiation epoch whose completion was applied.
    completed_epoch: Option<u64>,
    termination_reason: Option<TerminationReason>,
    created_at: DateTime<Utc>,
    /// `senders` attribute per content name, from content-modify.
    content_senders: BTreeMap<String, String>,
    /// ICE servers in effect when the session was created.
    ice_servers: Vec<IceServer>,
}

impl JingleSession {
    fn new(meta: SessionMeta, ice_servers: Vec<IceServer>) -> Self {
        Self {
            meta,
            state: SessionState::Pending,
            negotiation_epoch: 0,
            completed_epoch: None,
            termination_reason: None,
            created_at: Utc::now(),
            content_senders: BTreeMap::new(),
            ice_servers,
        }
    }

    /// Session opened by a remote session-initiate.
    pub fn new_incoming(
        sid: SessionId,
        local: Jid,
        remote: Jid,
        routing: RoutingClass,
        ice_servers: Vec<IceServer>,
    ) -> Self {
        Self::new(
            SessionMeta {
                sid,
                local,
                remote,
                role: Role::Responder,
                routing,
            },
            ice_servers,
        )
    }

    /// Session opened by a local call-initiation request.
    pub fn new_outgoing(
        sid: SessionId,
        local: Jid,
        remote: Jid,
        routing: RoutingClass,
        ice_servers: Vec<IceServer>,
    ) -> Self {
        Self::new(
            SessionMeta {
                sid,
                local,
                remote,
                role: Role::Initiator,
                routing,
            },
            ice_servers,
        )
    }

    pub fn sid(&self) -> &SessionId {
        &self.meta.sid
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn remote(&self) -> &Jid {
        &self.meta.remote
    }

    pub fn role(&self) -> Role {
        self.meta.role
    }

    pub fn routing(&self) -> RoutingClass {
        self.meta.routing
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn negotiation_epoch(&self) -> u64 {
        self.negotiation_epoch
    }

    pub fn completed_epoch(&self) -> Option<u64> {
        self.completed_epoch
    }

    pub fn termination_reason(&self) -> Option<&TerminationReason> {
        self.termination_reason.as_ref()
    }

    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }

    pub fn content_senders(&self, content: &str) -> Option<&str> {
        self.content_senders.get(content).map(String::as_str)
    }

    /// Apply a state transition. Returns error if transition is invalid.
    pub fn apply_transition(
        &mut self,
        transition: SessionTransition,
    ) -> Result<(), InvalidTransition> {
        let role = self.meta.role;
        match (self.state, role, transition) {
            (SessionState::Pending, Role::Initiator, SessionTransition::RemoteAccepted)
            | (SessionState::Pending, Role::Responder, SessionTransition::LocalAccepted) => {
                self.state = SessionState::Active;
            }
            (
                SessionState::Pending | SessionState::Active,
                _,
                SessionTransition::Terminated { reason },
            ) => {
                self.state = SessionState::Ended;
                self.termination_reason = Some(reason);
            }
            (current, role, transition) => {
                return Err(InvalidTransition {
                    current_state: current,
                    role,
                    attempted: format!("{transition:?}"),
                });
            }
        }
        Ok(())
    }

    /// Starts a renegotiation and returns its epoch. Only active sessions
    /// renegotiate.
    pub fn begin_renegotiation(&mut self) -> Result<u64, InvalidTransition> {
        if self.state != SessionState::Active {
            return Err(InvalidTransition {
                current_state: self.state,
                role: self.meta.role,
                attempted: "TransportReplace".to_string(),
            });
        }
        self.negotiation_epoch += 1;
        Ok(self.negotiation_epoch)
    }

    /// Whether a completion tagged with `epoch` still belongs to the latest
    /// renegotiation of a live session.
    pub fn is_current_epoch(&self, epoch: u64) -> bool {
        !self.state.is_ended() && epoch == self.negotiation_epoch
    }

    /// Records a completed renegotiation. Stale epochs are ignored.
    pub fn complete_renegotiation(&mut self, epoch: u64) -> bool {
        if !self.is_current_epoch(epoch) {
            return false;
        }
        self.completed_epoch = Some(epoch);
        true
    }

    pub fn record_senders(&mut self, content: impl Into<String>, senders: impl Into<String>) {
        self.content_senders.insert(content.into(), senders.into());
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            sid: self.meta.sid.clone(),
            local: self.meta.local.clone(),
            remote: self.meta.remote.clone(),
            role: self.meta.role,
            routing: self.meta.routing,
            state: self.state,
            negotiation_epoch: self.negotiation_epoch,
            created_at: self.created_at,
            content_senders: self.content_senders.clone(),
        }
    }
}

/// Owned, point-in-time view of a session for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub sid: SessionId,
    pub local: Jid,
    pub remote: Jid,
    pub role: Role,
    pub routing: RoutingClass,
    pub state: SessionState,
    pub negotiation_epoch: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub content_senders: BTreeMap<String, String>,
}
