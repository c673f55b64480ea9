//! Inbound Jingle routing and local session operations.
//!
//! The dispatcher owns the [`SessionRegistry`] and is driven by exactly one
//! task (see [`crate::actors::signaling`]), so every stanza is validated,
//! routed, applied and acknowledged before the next one starts. The only
//! suspension point is the transport engine's `apply_offer`, which runs on a
//! spawned task and reports back through a completion channel; completions
//! are checked against the session's negotiation epoch before they apply.

use super::error::{SessionError, TransportError};
use super::registry::SessionRegistry;
use super::session::{JingleSession, SessionSnapshot, SessionTransition};
use super::traits::{AnalyticsEvent, AnalyticsSink, StanzaSender, TransportEngine};
use crate::config::JingleConfig;
use crate::ice::IceConfigStore;
use jcore::jid::Jid;
use jcore::jingle::{Ack, AckErrorKind, JingleAction, JingleIqBuilder, ParsedJingleIq};
use jcore::types::events::{
    CallAccepted, CallEnded, CoreEventBus, Event, IncomingCall, RemoteSources,
    RenegotiationOutcome, SessionMeta,
};
use jcore::types::session::{RoutingClass, SessionId, TerminationReason};
use jcore::xml::Node;
use log::{debug, error, info, warn};
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

pub const EVENT_TRANSPORT_REPLACE_RECEIVED: &str = "jingle.transport_replace.received";
pub const EVENT_TRANSPORT_REPLACE_SUCCESS: &str = "jingle.transport_replace.success";

/// Result of a spawned `apply_offer`, posted back to the dispatcher.
#[derive(Debug)]
pub struct RenegotiationCompletion {
    pub sid: SessionId,
    pub epoch: u64,
    pub result: Result<(), TransportError>,
}

/// Everything the dispatcher talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn TransportEngine>,
    pub sender: Arc<dyn StanzaSender>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub events: CoreEventBus,
    pub ice: IceConfigStore,
}

pub struct SignalingDispatcher {
    local: Jid,
    config: JingleConfig,
    registry: SessionRegistry,
    collaborators: Collaborators,
    completion_tx: mpsc::UnboundedSender<RenegotiationCompletion>,
    started: Instant,
    stanza_prefix: String,
    stanza_counter: u64,
}

impl SignalingDispatcher {
    /// Creates a dispatcher for the local endpoint `local`. The returned
    /// receiver yields renegotiation completions, which must be fed back
    /// through [`Self::complete_renegotiation`].
    pub fn new(
        local: Jid,
        config: JingleConfig,
        collaborators: Collaborators,
    ) -> (Self, mpsc::UnboundedReceiver<RenegotiationCompletion>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let mut prefix = [0u8; 4];
        rand::rng().fill_bytes(&mut prefix);
        let dispatcher = Self {
            local,
            config,
            registry: SessionRegistry::new(),
            collaborators,
            completion_tx,
            started: Instant::now(),
            stanza_prefix: hex::encode(prefix),
            stanza_counter: 0,
        };
        (dispatcher, completion_rx)
    }

    pub fn local(&self) -> &Jid {
        &self.local
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Owned summaries of every live session.
    pub fn sessions_snapshot(&self) -> Vec<SessionSnapshot> {
        self.registry.snapshot()
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn next_stanza_id(&mut self) -> String {
        self.stanza_counter += 1;
        format!("jingle-{}-{}", self.stanza_prefix, self.stanza_counter)
    }

    fn emit(&self, event: Event) {
        debug!(target: "Jingle/Dispatch", "Emitting {}", event.name());
        self.collaborators.events.dispatch(&event);
    }

    fn track(&self, name: &'static str, p2p: bool) {
        let event = AnalyticsEvent {
            name,
            value: self.elapsed_ms(),
            p2p,
        };
        if let Err(e) = self.collaborators.analytics.send_event(event) {
            debug!(target: "Jingle/Dispatch", "Dropped analytics event {name}: {e}");
        }
    }

    /// Sends a stanza, logging instead of failing.
    pub async fn send_stanza(&self, node: Node) {
        if let Err(e) = self.collaborators.sender.send_node(node).await {
            warn!(target: "Jingle/Dispatch", "Failed to send stanza: {e:?}");
        }
    }

    /// Handles one inbound stanza and sends its acknowledgement. Returns the
    /// ack, or `None` when the stanza has no id to answer.
    pub async fn handle_stanza(&mut self, node: &Node) -> Option<Ack> {
        // replies to our own requests are never acknowledged
        if node.tag == "iq" && matches!(node.get_attr("type"), Some("result" | "error")) {
            debug!(
                target: "Jingle/Dispatch",
                "Ignoring {} reply {:?}", node.get_attr("type").unwrap_or_default(), node.get_attr("id")
            );
            return None;
        }

        let ack = match ParsedJingleIq::parse(node) {
            Ok(parsed) => {
                let outcome = self.route(&parsed).await;
                match outcome {
                    Ok(()) => Ack::ok(parsed.stanza_id, parsed.from, parsed.sid),
                    Err(kind) => {
                        warn!(
                            target: "Jingle/Dispatch",
                            "Rejecting {} sid={} from {}: {kind}",
                            parsed.raw_action, parsed.sid, parsed.from
                        );
                        Ack::error(parsed.stanza_id, parsed.from, Some(parsed.sid), kind)
                    }
                }
            }
            Err(e) => {
                let Some(id) = node.get_attr("id").filter(|id| !id.is_empty()) else {
                    warn!(target: "Jingle/Dispatch", "Dropping unparsable stanza without id: {e}");
                    return None;
                };
                let from = node
                    .get_attr("from")
                    .and_then(|f| f.parse::<Jid>().ok())
                    .unwrap_or_default();
                warn!(target: "Jingle/Dispatch", "Rejecting malformed stanza {id} from {from}: {e}");
                Ack::error(id, from, None, AckErrorKind::MalformedRequest)
            }
        };

        self.send_stanza(ack.to_node()).await;
        Some(ack)
    }

    async fn route(&mut self, parsed: &ParsedJingleIq) -> Result<(), AckErrorKind> {
        debug!(
            target: "Jingle/Dispatch",
            "<- {} sid={} from {}", parsed.raw_action, parsed.sid, parsed.from
        );

        if parsed.action.is_some_and(|action| action.opens_session()) {
            return self.on_session_initiate(parsed);
        }

        let session = self
            .registry
            .lookup(&parsed.sid)
            .map_err(|_| AckErrorKind::UnknownSession)?;
        if session.state().is_ended() {
            self.fail_session(&parsed.sid, "ended session still registered");
            return Err(AckErrorKind::UnknownSession);
        }
        if session.remote() != &parsed.from {
            return Err(AckErrorKind::SenderMismatch);
        }

        let Some(action) = parsed.action else {
            return Err(AckErrorKind::UnsupportedAction);
        };
        match action {
            JingleAction::SessionAccept => self.on_session_accept(parsed),
            JingleAction::ContentModify => self.on_content_modify(parsed),
            JingleAction::TransportInfo => self.on_transport_info(parsed),
            JingleAction::TransportReplace => self.on_transport_replace(parsed),
            JingleAction::SessionTerminate => self.on_session_terminate(parsed),
            JingleAction::SourceAdd | JingleAction::SourceRemove => {
                self.on_sources(parsed, action)
            }
            JingleAction::SessionInitiate | JingleAction::TransportReject => {
                Err(AckErrorKind::UnsupportedAction)
            }
        }
    }

    fn on_session_initiate(&mut self, parsed: &ParsedJingleIq) -> Result<(), AckErrorKind> {
        if self.registry.contains(&parsed.sid) || self.registry.is_retired(&parsed.sid) {
            return Err(AckErrorKind::DuplicateSession);
        }

        let routing = RoutingClass::classify(&parsed.from, &self.config.relay_resource);
        let ice_servers = self.collaborators.ice.servers_for(routing);
        let session = JingleSession::new_incoming(
            parsed.sid.clone(),
            self.local.clone(),
            parsed.from.clone(),
            routing,
            ice_servers,
        );
        let session = self
            .registry
            .create(session)
            .map_err(|_| AckErrorKind::DuplicateSession)?;
        let meta = session.meta().clone();
        self.collaborators
            .transport
            .configure_session(&meta, session.ice_servers());

        info!(
            target: "Jingle/Dispatch",
            "Created {routing:?} session {} with {}", meta.sid, meta.remote
        );

        if self.config.start_muted_support
            && let Some(state) = parsed.start_muted
        {
            self.emit(Event::StartMutedState {
                sid: meta.sid.clone(),
                state,
            });
        }
        self.emit(Event::IncomingCall(IncomingCall {
            meta,
            contents: parsed.contents.clone(),
            received_at_ms: self.elapsed_ms(),
        }));
        Ok(())
    }

    fn on_session_accept(&mut self, parsed: &ParsedJingleIq) -> Result<(), AckErrorKind> {
        let session = self.session_mut(&parsed.sid)?;
        if let Err(e) = session.apply_transition(SessionTransition::RemoteAccepted) {
            warn!(target: "Jingle/Dispatch", "session-accept for {}: {e}", parsed.sid);
            return Err(AckErrorKind::UnsupportedAction);
        }
        let meta = session.meta().clone();

        if let Err(e) = self
            .collaborators
            .transport
            .apply_answer(&parsed.sid, &parsed.contents)
        {
            error!(target: "Jingle/Dispatch", "Failed to apply answer for {}: {e}", parsed.sid);
        }
        info!(target: "Jingle/Dispatch", "Session {} is active", parsed.sid);
        self.emit(Event::CallAccepted(CallAccepted {
            meta,
            contents: parsed.contents.clone(),
        }));
        Ok(())
    }

    fn on_content_modify(&mut self, parsed: &ParsedJingleIq) -> Result<(), AckErrorKind> {
        let session = self.session_mut(&parsed.sid)?;
        for content in &parsed.contents {
            let (Some(name), Some(senders)) = (content.get_attr("name"), content.get_attr("senders"))
            else {
                continue;
            };
            debug!(
                target: "Jingle/Dispatch",
                "content-modify {} {name}: senders={senders}", parsed.sid
            );
            session.record_senders(name, senders);
        }
        Ok(())
    }

    fn on_transport_info(&mut self, parsed: &ParsedJingleIq) -> Result<(), AckErrorKind> {
        if let Err(e) = self
            .collaborators
            .transport
            .transport_info(&parsed.sid, &parsed.jingle)
        {
            warn!(target: "Jingle/Dispatch", "transport-info for {} failed: {e}", parsed.sid);
        }
        Ok(())
    }

    fn on_transport_replace(&mut self, parsed: &ParsedJingleIq) -> Result<(), AckErrorKind> {
        let session = self.session_mut(&parsed.sid)?;
        let epoch = match session.begin_renegotiation() {
            Ok(epoch) => epoch,
            Err(e) => {
                warn!(target: "Jingle/Dispatch", "transport-replace for {}: {e}", parsed.sid);
                return Err(AckErrorKind::UnsupportedAction);
            }
        };
        let p2p = session.routing().is_p2p();

        let now = self.elapsed_ms();
        info!(target: "Jingle/Dispatch", "(TIME) received transport-replace:\t{now}");
        self.track(EVENT_TRANSPORT_REPLACE_RECEIVED, p2p);

        let transport = self.collaborators.transport.clone();
        let completion_tx = self.completion_tx.clone();
        let sid = parsed.sid.clone();
        let contents = parsed.contents.clone();
        tokio::spawn(async move {
            let result = transport.apply_offer(&sid, contents).await;
            if completion_tx
                .send(RenegotiationCompletion { sid, epoch, result })
                .is_err()
            {
                debug!(target: "Jingle/Dispatch", "Dispatcher gone before renegotiation completed");
            }
        });
        Ok(())
    }

    fn on_session_terminate(&mut self, parsed: &ParsedJingleIq) -> Result<(), AckErrorKind> {
        let reason = parsed.reason.clone().unwrap_or_default();
        let meta = self.end_session(&parsed.sid, reason.clone())?;
        info!(
            target: "Jingle/Dispatch",
            "Session {} terminated by {}: {:?} {:?}",
            parsed.sid, parsed.from, reason.condition, reason.text
        );
        self.emit(Event::CallEnded(CallEnded { meta, reason }));
        Ok(())
    }

    fn on_sources(
        &mut self,
        parsed: &ParsedJingleIq,
        action: JingleAction,
    ) -> Result<(), AckErrorKind> {
        let meta = self.session_mut(&parsed.sid)?.meta().clone();
        let transport = &self.collaborators.transport;
        let result = if action == JingleAction::SourceAdd {
            transport.add_remote_sources(&parsed.sid, &parsed.contents)
        } else {
            transport.remove_remote_sources(&parsed.sid, &parsed.contents)
        };
        if let Err(e) = result {
            warn!(target: "Jingle/Dispatch", "{action} for {} failed: {e}", parsed.sid);
        }

        let sources = RemoteSources {
            meta,
            contents: parsed.contents.clone(),
        };
        self.emit(if action == JingleAction::SourceAdd {
            Event::RemoteSourcesAdded(sources)
        } else {
            Event::RemoteSourcesRemoved(sources)
        });
        Ok(())
    }

    fn session_mut(&mut self, sid: &SessionId) -> Result<&mut JingleSession, AckErrorKind> {
        self.registry
            .lookup_mut(sid)
            .map_err(|_| AckErrorKind::UnknownSession)
    }

    /// Moves the session to `ended` and removes it from the registry.
    fn end_session(
        &mut self,
        sid: &SessionId,
        reason: TerminationReason,
    ) -> Result<SessionMeta, AckErrorKind> {
        let session = self.session_mut(sid)?;
        if let Err(e) = session.apply_transition(SessionTransition::Terminated { reason }) {
            warn!(target: "Jingle/Dispatch", "terminate for {sid}: {e}");
            return Err(AckErrorKind::UnknownSession);
        }
        let meta = session.meta().clone();
        if let Err(e) = self.registry.remove(sid) {
            error!(target: "Jingle/Dispatch", "Failed to remove ended session: {e}");
        }
        Ok(meta)
    }

    /// Force-removes a session after an internal inconsistency.
    fn fail_session(&mut self, sid: &SessionId, reason: &str) {
        error!(target: "Jingle/Dispatch", "Fatal error on session {sid}: {reason}");
        if let Err(e) = self.registry.remove(sid) {
            error!(target: "Jingle/Dispatch", "Failed to remove failed session: {e}");
        }
        self.emit(Event::JingleFatalError {
            sid: sid.clone(),
            reason: reason.to_string(),
        });
    }

    /// Applies a renegotiation completion. Returns `false` when it was
    /// discarded because the session is gone or a newer renegotiation began.
    pub async fn complete_renegotiation(&mut self, completion: RenegotiationCompletion) -> bool {
        let RenegotiationCompletion { sid, epoch, result } = completion;
        let Ok(session) = self.registry.lookup_mut(&sid) else {
            debug!(target: "Jingle/Dispatch", "Discarding renegotiation {epoch} of gone session {sid}");
            return false;
        };
        if !session.is_current_epoch(epoch) {
            debug!(
                target: "Jingle/Dispatch",
                "Discarding stale renegotiation {epoch} of {sid} (current {})",
                session.negotiation_epoch()
            );
            return false;
        }

        let meta = session.meta().clone();
        match result {
            Ok(()) => {
                session.complete_renegotiation(epoch);
                let now = self.elapsed_ms();
                info!(target: "Jingle/Dispatch", "(TIME) transport-replace success:\t{now}");
                self.track(EVENT_TRANSPORT_REPLACE_SUCCESS, meta.routing.is_p2p());
                self.emit(Event::TransportRenegotiationSucceeded(RenegotiationOutcome {
                    meta,
                    epoch,
                    error: None,
                }));
            }
            Err(e) => {
                error!(target: "Jingle/Dispatch", "transport-replace for {sid} failed: {e}");
                let contents = self.collaborators.transport.reject_transport(&sid);
                let id = self.next_stanza_id();
                let reject = JingleIqBuilder::new(
                    sid.clone(),
                    JingleAction::TransportReject,
                    meta.local.clone(),
                    meta.remote.clone(),
                )
                .id(id)
                .contents(contents)
                .build();
                self.send_stanza(reject).await;
                self.emit(Event::TransportRenegotiationFailed(RenegotiationOutcome {
                    meta,
                    epoch,
                    error: Some(e.to_string()),
                }));
            }
        }
        true
    }

    /// Creates a pending outgoing session with a fresh identifier. The caller
    /// sends the session-initiate (see [`Self::build_session_initiate`]).
    pub fn open_session(&mut self, local: Jid, remote: Jid) -> Result<SessionSnapshot, SessionError> {
        let sid = self.registry.generate_id();
        let routing = RoutingClass::classify(&remote, &self.config.relay_resource);
        let ice_servers = self.collaborators.ice.servers_for(routing);
        let session = self.registry.create(JingleSession::new_outgoing(
            sid, local, remote, routing, ice_servers,
        ))?;
        self.collaborators
            .transport
            .configure_session(session.meta(), session.ice_servers());
        info!(
            target: "Jingle/Dispatch",
            "Opened {routing:?} session {} to {}", session.sid(), session.remote()
        );
        Ok(session.snapshot())
    }

    pub fn build_session_initiate(
        &mut self,
        sid: &SessionId,
        contents: Vec<Node>,
    ) -> Result<Node, SessionError> {
        let meta = self.registry.lookup(sid)?.meta().clone();
        let id = self.next_stanza_id();
        Ok(JingleIqBuilder::new(
            meta.sid,
            JingleAction::SessionInitiate,
            meta.local.clone(),
            meta.remote,
        )
        .id(id)
        .initiator(meta.local)
        .contents(contents)
        .build())
    }

    /// Accepts a pending incoming session and sends the session-accept.
    pub async fn accept_session(
        &mut self,
        sid: &SessionId,
        contents: Vec<Node>,
    ) -> Result<(), SessionError> {
        let session = self.registry.lookup_mut(sid)?;
        session.apply_transition(SessionTransition::LocalAccepted)?;
        let meta = session.meta().clone();

        let id = self.next_stanza_id();
        let accept = JingleIqBuilder::new(
            meta.sid.clone(),
            JingleAction::SessionAccept,
            meta.local.clone(),
            meta.remote.clone(),
        )
        .id(id)
        .initiator(meta.remote.clone())
        .responder(meta.local.clone())
        .contents(contents)
        .build();
        self.send_stanza(accept).await;
        info!(target: "Jingle/Dispatch", "Accepted session {sid}");
        Ok(())
    }

    /// Ends a live session locally, sends the session-terminate and removes it.
    pub async fn terminate_session(
        &mut self,
        sid: &SessionId,
        reason: TerminationReason,
    ) -> Result<(), SessionError> {
        let session = self.registry.lookup_mut(sid)?;
        session.apply_transition(SessionTransition::Terminated {
            reason: reason.clone(),
        })?;
        let meta = session.meta().clone();
        self.registry.remove(sid)?;

        let id = self.next_stanza_id();
        let terminate = JingleIqBuilder::new(
            meta.sid.clone(),
            JingleAction::SessionTerminate,
            meta.local.clone(),
            meta.remote.clone(),
        )
        .id(id)
        .reason(reason.clone())
        .build();
        self.send_stanza(terminate).await;
        info!(target: "Jingle/Dispatch", "Terminated session {sid} locally");
        self.emit(Event::CallEnded(CallEnded { meta, reason }));
        Ok(())
    }

    /// Outbound source-add / source-remove for a live session.
    pub async fn send_sources(
        &mut self,
        sid: &SessionId,
        action: JingleAction,
        contents: Vec<Node>,
    ) -> Result<(), SessionError> {
        let meta = self.registry.lookup(sid)?.meta().clone();
        let id = self.next_stanza_id();
        let node = JingleIqBuilder::new(meta.sid, action, meta.local, meta.remote)
            .id(id)
            .contents(contents)
            .build();
        self.send_stanza(node).await;
        Ok(())
    }
}
