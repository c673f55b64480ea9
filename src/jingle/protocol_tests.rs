//! Protocol-level scenarios for the dispatcher: acks, session lifecycle,
//! renegotiation ordering and collaborator calls.

#[cfg(test)]
mod tests {
    use crate::config::JingleConfig;
    use crate::ice::IceConfigStore;
    use crate::jingle::dispatcher::{
        Collaborators, EVENT_TRANSPORT_REPLACE_RECEIVED, EVENT_TRANSPORT_REPLACE_SUCCESS,
        RenegotiationCompletion, SignalingDispatcher,
    };
    use crate::jingle::error::{SessionError, TransportError};
    use crate::jingle::traits::{AnalyticsEvent, AnalyticsSink, StanzaSender, TransportEngine};
    use async_trait::async_trait;
    use jcore::ice::IceServer;
    use jcore::jid::Jid;
    use jcore::jingle::{AckErrorKind, NS_JINGLE, ParsedJingleIq};
    use jcore::types::events::{Event, EventHandler, SessionMeta};
    use jcore::types::session::{
        Role, RoutingClass, SessionId, SessionState, TerminationReason,
    };
    use jcore::xml::{Node, NodeBuilder};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    const FOCUS: &str = "room@conference.example.com/focus";
    const PEER: &str = "room@conference.example.com/b0b5e1f2";
    const OTHER: &str = "room@conference.example.com/ma11041e";
    const ME: &str = "room@conference.example.com/a1ce0a1c";

    fn jid(s: &str) -> Jid {
        s.parse().unwrap()
    }

    // -- Recording collaborators --

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<Node>>,
    }

    impl RecordingSender {
        fn sent(&self) -> Vec<Node> {
            self.sent.lock().unwrap().clone()
        }

        fn jingle_actions(&self) -> Vec<String> {
            self.sent()
                .iter()
                .filter_map(|n| n.get_optional_child("jingle"))
                .filter_map(|j| j.get_attr("action").map(str::to_string))
                .collect()
        }
    }

    #[async_trait]
    impl StanzaSender for RecordingSender {
        async fn send_node(&self, node: Node) -> Result<(), anyhow::Error> {
            self.sent.lock().unwrap().push(node);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<String>>,
        configured: Mutex<Vec<(SessionMeta, Vec<IceServer>)>>,
        fail_offers: AtomicBool,
    }

    impl RecordingEngine {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransportEngine for RecordingEngine {
        fn configure_session(&self, meta: &SessionMeta, ice_servers: &[IceServer]) {
            self.configured
                .lock()
                .unwrap()
                .push((meta.clone(), ice_servers.to_vec()));
        }

        async fn apply_offer(
            &self,
            sid: &SessionId,
            contents: Vec<Node>,
        ) -> Result<(), TransportError> {
            self.record(format!("apply_offer {sid} {}", contents.len()));
            if self.fail_offers.load(Ordering::SeqCst) {
                return Err(TransportError::new("ICE failed"));
            }
            Ok(())
        }

        fn apply_answer(&self, sid: &SessionId, contents: &[Node]) -> Result<(), TransportError> {
            self.record(format!("apply_answer {sid} {}", contents.len()));
            Ok(())
        }

        fn add_remote_sources(
            &self,
            sid: &SessionId,
            contents: &[Node],
        ) -> Result<(), TransportError> {
            self.record(format!("add_sources {sid} {}", contents.len()));
            Ok(())
        }

        fn remove_remote_sources(
            &self,
            sid: &SessionId,
            contents: &[Node],
        ) -> Result<(), TransportError> {
            self.record(format!("remove_sources {sid} {}", contents.len()));
            Ok(())
        }

        fn transport_info(&self, sid: &SessionId, jingle: &Node) -> Result<(), TransportError> {
            let n = jingle.get_children_by_tag("content").len();
            self.record(format!("transport_info {sid} {n}"));
            Ok(())
        }

        fn reject_transport(&self, _sid: &SessionId) -> Vec<Node> {
            vec![content("audio")]
        }
    }

    #[derive(Default)]
    struct RecordingAnalytics {
        events: Mutex<Vec<AnalyticsEvent>>,
    }

    impl AnalyticsSink for RecordingAnalytics {
        fn send_event(&self, event: AnalyticsEvent) -> Result<(), anyhow::Error> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingEvents {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingEvents {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(Event::name).collect()
        }
    }

    impl EventHandler for RecordingEvents {
        fn handle_event(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    struct Harness {
        dispatcher: SignalingDispatcher,
        completions: mpsc::UnboundedReceiver<RenegotiationCompletion>,
        sender: Arc<RecordingSender>,
        engine: Arc<RecordingEngine>,
        analytics: Arc<RecordingAnalytics>,
        events: Arc<RecordingEvents>,
        ice: IceConfigStore,
    }

    fn harness_with(config: JingleConfig) -> Harness {
        let _ = env_logger::builder().is_test(true).try_init();
        let sender = Arc::new(RecordingSender::default());
        let engine = Arc::new(RecordingEngine::default());
        let analytics = Arc::new(RecordingAnalytics::default());
        let events = Arc::new(RecordingEvents::default());
        let bus = jcore::types::events::CoreEventBus::new();
        bus.add_handler(events.clone());
        let ice = IceConfigStore::new();

        let (dispatcher, completions) = SignalingDispatcher::new(
            jid(ME),
            config,
            Collaborators {
                transport: engine.clone(),
                sender: sender.clone(),
                analytics: analytics.clone(),
                events: bus,
                ice: ice.clone(),
            },
        );
        Harness {
            dispatcher,
            completions,
            sender,
            engine,
            analytics,
            events,
            ice,
        }
    }

    fn harness() -> Harness {
        harness_with(JingleConfig::default())
    }

    fn content(name: &str) -> Node {
        NodeBuilder::new("content")
            .attr("name", name)
            .attr("creator", "initiator")
            .build()
    }

    fn jingle_iq(id: &str, from: &str, action: &str, sid: &str, children: Vec<Node>) -> Node {
        let mut jingle = NodeBuilder::new("jingle")
            .attr("xmlns", NS_JINGLE)
            .attr("action", action)
            .attr("sid", sid);
        if !children.is_empty() {
            jingle = jingle.children(children);
        }
        NodeBuilder::new("iq")
            .attr("type", "set")
            .attr("id", id)
            .attr("from", from)
            .attr("to", ME)
            .children([jingle.build()])
            .build()
    }

    fn initiate(id: &str, from: &str, sid: &str) -> Node {
        jingle_iq(
            id,
            from,
            "session-initiate",
            sid,
            vec![content("audio"), content("video")],
        )
    }

    impl Harness {
        async fn inbound(&mut self, node: Node) -> Option<AckErrorKind> {
            let ack = self.dispatcher.handle_stanza(&node).await.unwrap();
            assert_eq!(ack.stanza_id, node.get_attr("id").unwrap());
            ack.error_kind()
        }

        fn state(&self, sid: &str) -> Option<SessionState> {
            self.dispatcher
                .registry()
                .lookup(&SessionId::from(sid))
                .ok()
                .map(|s| s.state())
        }

        /// Incoming session from `from`, accepted locally.
        async fn active_incoming(&mut self, from: &str, sid: &str) {
            assert_eq!(self.inbound(initiate("init", from, sid)).await, None);
            self.dispatcher
                .accept_session(&SessionId::from(sid), vec![content("audio")])
                .await
                .unwrap();
            assert_eq!(self.state(sid), Some(SessionState::Active));
        }
    }

    // ================================================================
    // Acknowledgements
    // ================================================================

    #[tokio::test]
    async fn test_every_stanza_gets_exactly_one_ack() {
        let mut h = harness();
        h.inbound(initiate("i1", FOCUS, "s1")).await;
        h.inbound(jingle_iq("i2", FOCUS, "transport-info", "s1", vec![]))
            .await;
        h.inbound(jingle_iq("i3", FOCUS, "content-modify", "nope", vec![]))
            .await;

        let sent = h.sender.sent();
        assert_eq!(sent.len(), 3);
        let ids: Vec<_> = sent.iter().map(|n| n.get_attr("id").unwrap()).collect();
        assert_eq!(ids, vec!["i1", "i2", "i3"]);
        assert!(sent.iter().all(|n| n.get_attr("to") == Some(FOCUS)));
        assert_eq!(sent[0].get_attr("type"), Some("result"));
        assert_eq!(sent[2].get_attr("type"), Some("error"));
    }

    #[tokio::test]
    async fn test_content_modify_for_unknown_session() {
        let mut h = harness();
        let kind = h
            .inbound(jingle_iq(
                "cm",
                FOCUS,
                "content-modify",
                "ghost",
                vec![content("video")],
            ))
            .await;
        assert_eq!(kind, Some(AckErrorKind::UnknownSession));
        assert!(h.dispatcher.registry().is_empty());

        let ack = h.sender.sent().pop().unwrap();
        let error = ack.get_optional_child("error").unwrap();
        assert!(error.get_optional_child("item-not-found").is_some());
        assert!(error.get_optional_child("unknown-session").is_some());
        assert!(h.events.names().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_initiate_keeps_first_session() {
        let mut h = harness();
        assert_eq!(h.inbound(initiate("a", PEER, "fresh")).await, None);
        assert_eq!(
            h.inbound(initiate("b", OTHER, "fresh")).await,
            Some(AckErrorKind::DuplicateSession)
        );

        let session = h
            .dispatcher
            .registry()
            .lookup(&SessionId::from("fresh"))
            .unwrap();
        assert_eq!(session.remote(), &jid(PEER));
        assert_eq!(session.state(), SessionState::Pending);
        assert_eq!(h.events.names(), vec!["incoming-call"]);

        let ack = h.sender.sent().pop().unwrap();
        let error = ack.get_optional_child("error").unwrap();
        assert!(error.get_optional_child("service-unavailable").is_some());
        assert!(error.get_optional_child("unknown-session").is_none());
    }

    #[tokio::test]
    async fn test_sender_mismatch_leaves_session_alone() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;

        let kind = h
            .inbound(jingle_iq("b", PEER, "session-terminate", "s1", vec![]))
            .await;
        assert_eq!(kind, Some(AckErrorKind::SenderMismatch));
        assert_eq!(h.state("s1"), Some(SessionState::Pending));

        // reported on the wire exactly like an unknown session
        let ack = h.sender.sent().pop().unwrap();
        assert_eq!(ack.get_attr("to"), Some(PEER));
        let error = ack.get_optional_child("error").unwrap();
        assert!(error.get_optional_child("item-not-found").is_some());
        assert!(error.get_optional_child("unknown-session").is_some());
    }

    #[tokio::test]
    async fn test_unsupported_actions() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;

        assert_eq!(
            h.inbound(jingle_iq("b", FOCUS, "session-info", "s1", vec![]))
                .await,
            Some(AckErrorKind::UnsupportedAction)
        );
        assert_eq!(
            h.inbound(jingle_iq("c", FOCUS, "transport-reject", "s1", vec![]))
                .await,
            Some(AckErrorKind::UnsupportedAction)
        );
        // unrecognised actions never create sessions
        assert_eq!(
            h.inbound(jingle_iq("d", FOCUS, "session-info", "s2", vec![]))
                .await,
            Some(AckErrorKind::UnknownSession)
        );
        assert_eq!(h.dispatcher.registry().len(), 1);
        assert_eq!(h.state("s1"), Some(SessionState::Pending));
    }

    #[tokio::test]
    async fn test_unknown_action_checked_after_session_and_sender() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;

        assert_eq!(
            h.inbound(jingle_iq("b", FOCUS, "session-info", "ghost", vec![]))
                .await,
            Some(AckErrorKind::UnknownSession)
        );
        assert_eq!(
            h.inbound(jingle_iq("c", PEER, "session-info", "s1", vec![]))
                .await,
            Some(AckErrorKind::SenderMismatch)
        );

        // a foreign sender learns nothing about the live session
        let ack = h.sender.sent().pop().unwrap();
        let error = ack.get_optional_child("error").unwrap();
        assert!(error.get_optional_child("item-not-found").is_some());
        assert!(error.get_optional_child("bad-request").is_none());
        assert_eq!(h.state("s1"), Some(SessionState::Pending));
    }

    #[tokio::test]
    async fn test_malformed_stanzas() {
        let mut h = harness();
        let no_jingle = NodeBuilder::new("iq")
            .attr("type", "set")
            .attr("id", "m1")
            .attr("from", FOCUS)
            .build();
        let ack = h.dispatcher.handle_stanza(&no_jingle).await.unwrap();
        assert_eq!(ack.error_kind(), Some(AckErrorKind::MalformedRequest));
        assert_eq!(ack.to, jid(FOCUS));

        let sent = h.sender.sent();
        let error = sent[0].get_optional_child("error").unwrap();
        assert!(error.get_optional_child("bad-request").is_some());

        let no_id = NodeBuilder::new("iq").attr("type", "set").build();
        assert!(h.dispatcher.handle_stanza(&no_id).await.is_none());
        assert_eq!(h.sender.sent().len(), 1);
        assert!(h.dispatcher.registry().is_empty());
    }

    // ================================================================
    // Session lifecycle
    // ================================================================

    #[tokio::test]
    async fn test_local_open_accept_terminate_scenario() {
        let mut h = harness();
        let opened = h.dispatcher.open_session(jid(ME), jid(PEER)).unwrap();
        let sid = opened.sid.clone();
        assert_eq!(opened.state, SessionState::Pending);
        assert_eq!(opened.role, Role::Initiator);
        assert_eq!(opened.routing, RoutingClass::PeerToPeer);
        assert_eq!(sid.as_str().len(), 32);

        let initiate = h
            .dispatcher
            .build_session_initiate(&sid, vec![content("audio")])
            .unwrap();
        let parsed = ParsedJingleIq::parse(&initiate).unwrap();
        assert_eq!(parsed.sid, sid);
        assert_eq!(parsed.initiator, Some(jid(ME)));
        assert_eq!(parsed.to, jid(PEER));

        let kind = h
            .inbound(jingle_iq(
                "acc",
                PEER,
                "session-accept",
                sid.as_str(),
                vec![content("audio")],
            ))
            .await;
        assert_eq!(kind, None);
        assert_eq!(h.state(sid.as_str()), Some(SessionState::Active));
        assert!(h.engine.calls().contains(&format!("apply_answer {sid} 1")));

        h.dispatcher
            .terminate_session(&sid, TerminationReason::success())
            .await
            .unwrap();
        assert_eq!(h.state(sid.as_str()), None);

        let terminate = h.sender.sent().pop().unwrap();
        let parsed = ParsedJingleIq::parse(&terminate).unwrap();
        assert_eq!(parsed.raw_action, "session-terminate");
        assert_eq!(
            parsed.reason.unwrap().condition.as_deref(),
            Some("success")
        );

        let kind = h
            .inbound(jingle_iq("ti", PEER, "transport-info", sid.as_str(), vec![]))
            .await;
        assert_eq!(kind, Some(AckErrorKind::UnknownSession));
        assert_eq!(
            h.events.names(),
            vec!["call-accepted", "call-ended"]
        );
    }

    #[tokio::test]
    async fn test_remote_terminate_records_reason_and_retires_id() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;

        let reason = NodeBuilder::new("reason")
            .children([
                NodeBuilder::new("gone").build(),
                NodeBuilder::new("text").text("conference ended").build(),
            ])
            .build();
        assert_eq!(
            h.inbound(jingle_iq("b", FOCUS, "session-terminate", "s1", vec![reason]))
                .await,
            None
        );
        assert_eq!(h.state("s1"), None);

        let events = h.events.events.lock().unwrap().clone();
        let Some(Event::CallEnded(ended)) = events.last() else {
            panic!("expected call-ended, got {:?}", h.events.names());
        };
        assert_eq!(ended.reason.condition.as_deref(), Some("gone"));
        assert_eq!(ended.reason.text.as_deref(), Some("conference ended"));
        assert_eq!(ended.meta.sid.as_str(), "s1");

        for action in ["transport-info", "source-add", "session-terminate"] {
            assert_eq!(
                h.inbound(jingle_iq("c", FOCUS, action, "s1", vec![])).await,
                Some(AckErrorKind::UnknownSession),
                "{action}"
            );
        }
        assert_eq!(
            h.inbound(initiate("d", FOCUS, "s1")).await,
            Some(AckErrorKind::DuplicateSession)
        );
        assert!(h.dispatcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_incoming_call_from_relay_with_start_muted() {
        let mut h = harness();
        let servers = vec![IceServer {
            urls: "turns:turn.example.com:443?transport=tcp".into(),
            username: Some("u".into()),
            credential: Some("p".into()),
        }];
        h.ice.set(RoutingClass::Relayed, servers.clone());

        let node = jingle_iq(
            "a",
            FOCUS,
            "session-initiate",
            "s1",
            vec![
                content("audio"),
                NodeBuilder::new("startmuted")
                    .attr("audio", "true")
                    .attr("video", "false")
                    .build(),
            ],
        );
        assert_eq!(h.inbound(node).await, None);
        assert_eq!(h.events.names(), vec!["start-muted-state", "incoming-call"]);

        let events = h.events.events.lock().unwrap().clone();
        let Event::StartMutedState { state, .. } = &events[0] else {
            panic!("expected start-muted-state");
        };
        assert!(state.audio && !state.video);
        let Event::IncomingCall(call) = &events[1] else {
            panic!("expected incoming-call");
        };
        assert_eq!(call.meta.routing, RoutingClass::Relayed);
        assert_eq!(call.meta.role, Role::Responder);
        assert_eq!(call.contents.len(), 1);

        // ICE configuration is snapshotted at creation
        h.ice.set(RoutingClass::Relayed, Vec::new());
        let configured = h.engine.configured.lock().unwrap().clone();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].1, servers);
        let session = h.dispatcher.registry().lookup(&SessionId::from("s1")).unwrap();
        assert_eq!(session.ice_servers(), servers.as_slice());
    }

    #[tokio::test]
    async fn test_start_muted_ignored_when_unsupported() {
        let mut h = harness_with(JingleConfig {
            start_muted_support: false,
            ..Default::default()
        });
        let node = jingle_iq(
            "a",
            PEER,
            "session-initiate",
            "s1",
            vec![NodeBuilder::new("startmuted").attr("audio", "true").build()],
        );
        h.inbound(node).await;
        assert_eq!(h.events.names(), vec!["incoming-call"]);
    }

    #[tokio::test]
    async fn test_custom_relay_resource() {
        let mut h = harness_with(JingleConfig {
            relay_resource: "jvb".into(),
            ..Default::default()
        });
        h.inbound(initiate("a", FOCUS, "s1")).await;
        h.inbound(initiate("b", "room@conference.example.com/jvb", "s2"))
            .await;

        let snapshot = h.dispatcher.sessions_snapshot();
        let routing = |sid: &str| {
            snapshot
                .iter()
                .find(|s| s.sid.as_str() == sid)
                .map(|s| s.routing)
        };
        assert_eq!(routing("s1"), Some(RoutingClass::PeerToPeer));
        assert_eq!(routing("s2"), Some(RoutingClass::Relayed));
    }

    #[tokio::test]
    async fn test_out_of_order_accept_is_rejected() {
        let mut h = harness();
        // we are the responder; the remote cannot accept its own offer
        h.inbound(initiate("a", FOCUS, "s1")).await;
        assert_eq!(
            h.inbound(jingle_iq("b", FOCUS, "session-accept", "s1", vec![]))
                .await,
            Some(AckErrorKind::UnsupportedAction)
        );
        assert_eq!(h.state("s1"), Some(SessionState::Pending));

        let opened = h.dispatcher.open_session(jid(ME), jid(PEER)).unwrap();
        let err = h
            .dispatcher
            .accept_session(&opened.sid, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_local_accept_sends_session_accept() {
        let mut h = harness();
        h.active_incoming(FOCUS, "s1").await;

        let accept = h.sender.sent().pop().unwrap();
        let jingle = accept.get_optional_child("jingle").unwrap();
        assert_eq!(jingle.get_attr("action"), Some("session-accept"));
        assert_eq!(jingle.get_attr("responder"), Some(ME));
        assert_eq!(jingle.get_attr("initiator"), Some(FOCUS));
        assert_eq!(accept.get_attr("to"), Some(FOCUS));

        let err = h
            .dispatcher
            .terminate_session(&SessionId::from("missing"), TerminationReason::success())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    // ================================================================
    // In-session actions
    // ================================================================

    #[tokio::test]
    async fn test_transport_info_and_sources_reach_engine() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;

        h.inbound(jingle_iq(
            "b",
            FOCUS,
            "transport-info",
            "s1",
            vec![content("audio")],
        ))
        .await;
        h.inbound(jingle_iq(
            "c",
            FOCUS,
            "source-add",
            "s1",
            vec![content("audio"), content("video")],
        ))
        .await;
        h.inbound(jingle_iq("d", FOCUS, "removesource", "s1", vec![content("video")]))
            .await;

        assert_eq!(
            h.engine.calls(),
            vec![
                "transport_info s1 1",
                "add_sources s1 2",
                "remove_sources s1 1"
            ]
        );
        assert_eq!(
            h.events.names(),
            vec![
                "incoming-call",
                "remote-sources-added",
                "remote-sources-removed"
            ]
        );
        assert_eq!(h.state("s1"), Some(SessionState::Pending));
    }

    #[tokio::test]
    async fn test_content_modify_records_senders() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;

        let modified = NodeBuilder::new("content")
            .attr("name", "video")
            .attr("senders", "responder")
            .build();
        assert_eq!(
            h.inbound(jingle_iq("b", FOCUS, "content-modify", "s1", vec![modified]))
                .await,
            None
        );

        let session = h.dispatcher.registry().lookup(&SessionId::from("s1")).unwrap();
        assert_eq!(session.content_senders("video"), Some("responder"));
        assert_eq!(session.state(), SessionState::Pending);
    }

    #[tokio::test]
    async fn test_outbound_sources() {
        let mut h = harness();
        h.active_incoming(FOCUS, "s1").await;
        h.dispatcher
            .send_sources(
                &SessionId::from("s1"),
                jcore::jingle::JingleAction::SourceAdd,
                vec![content("video")],
            )
            .await
            .unwrap();
        assert_eq!(
            h.sender.jingle_actions().last().map(String::as_str),
            Some("source-add")
        );
    }

    // ================================================================
    // Renegotiation
    // ================================================================

    #[tokio::test]
    async fn test_transport_replace_success() {
        let mut h = harness();
        h.active_incoming(PEER, "s1").await;

        assert_eq!(
            h.inbound(jingle_iq(
                "tr",
                PEER,
                "transport-replace",
                "s1",
                vec![content("audio"), content("video")],
            ))
            .await,
            None
        );
        let completion = h.completions.recv().await.unwrap();
        assert_eq!(completion.epoch, 1);
        assert!(h.dispatcher.complete_renegotiation(completion).await);

        assert!(h.engine.calls().contains(&"apply_offer s1 2".to_string()));
        assert_eq!(
            h.events.names().last(),
            Some(&"transport-renegotiation-succeeded")
        );

        let analytics = h.analytics.events.lock().unwrap().clone();
        let names: Vec<_> = analytics.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                EVENT_TRANSPORT_REPLACE_RECEIVED,
                EVENT_TRANSPORT_REPLACE_SUCCESS
            ]
        );
        assert!(analytics.iter().all(|e| e.p2p));
        assert!(analytics[1].value >= analytics[0].value);

        let session = h.dispatcher.registry().lookup(&SessionId::from("s1")).unwrap();
        assert_eq!(session.completed_epoch(), Some(1));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_transport_replace_requires_active_session() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;
        assert_eq!(
            h.inbound(jingle_iq("b", FOCUS, "transport-replace", "s1", vec![]))
                .await,
            Some(AckErrorKind::UnsupportedAction)
        );
        assert!(h.completions.try_recv().is_err());
        let session = h.dispatcher.registry().lookup(&SessionId::from("s1")).unwrap();
        assert_eq!(session.negotiation_epoch(), 0);
    }

    #[tokio::test]
    async fn test_stale_renegotiation_is_discarded() {
        let mut h = harness();
        h.active_incoming(FOCUS, "s1").await;

        h.inbound(jingle_iq("r1", FOCUS, "transport-replace", "s1", vec![]))
            .await;
        h.inbound(jingle_iq("r2", FOCUS, "transport-replace", "s1", vec![]))
            .await;

        let first = h.completions.recv().await.unwrap();
        let second = h.completions.recv().await.unwrap();
        let mut epochs = [first.epoch, second.epoch];
        epochs.sort_unstable();
        assert_eq!(epochs, [1, 2]);

        let applied = [
            h.dispatcher.complete_renegotiation(first).await,
            h.dispatcher.complete_renegotiation(second).await,
        ];
        assert_eq!(applied.iter().filter(|a| **a).count(), 1);

        let session = h.dispatcher.registry().lookup(&SessionId::from("s1")).unwrap();
        assert_eq!(session.negotiation_epoch(), 2);
        assert_eq!(session.completed_epoch(), Some(2));
        let succeeded = h
            .events
            .names()
            .into_iter()
            .filter(|n| *n == "transport-renegotiation-succeeded")
            .count();
        assert_eq!(succeeded, 1);
    }

    #[tokio::test]
    async fn test_stale_completion_does_not_touch_session() {
        let mut h = harness();
        h.active_incoming(FOCUS, "s1").await;
        h.inbound(jingle_iq("r1", FOCUS, "transport-replace", "s1", vec![]))
            .await;
        let _ = h.completions.recv().await.unwrap();

        let before = h.dispatcher.registry().lookup(&SessionId::from("s1")).unwrap().snapshot();
        let stale = RenegotiationCompletion {
            sid: SessionId::from("s1"),
            epoch: 0,
            result: Err(TransportError::new("late failure")),
        };
        assert!(!h.dispatcher.complete_renegotiation(stale).await);

        let after = h.dispatcher.registry().lookup(&SessionId::from("s1")).unwrap().snapshot();
        assert_eq!(before, after);
        assert!(!h.sender.jingle_actions().contains(&"transport-reject".to_string()));
    }

    #[tokio::test]
    async fn test_failed_renegotiation_rejects_transport() {
        let mut h = harness();
        h.engine.fail_offers.store(true, Ordering::SeqCst);
        h.active_incoming(FOCUS, "s1").await;

        h.inbound(jingle_iq("r1", FOCUS, "transport-replace", "s1", vec![]))
            .await;
        let completion = h.completions.recv().await.unwrap();
        assert!(h.dispatcher.complete_renegotiation(completion).await);

        let reject = h.sender.sent().pop().unwrap();
        let parsed = ParsedJingleIq::parse(&reject).unwrap();
        assert_eq!(parsed.raw_action, "transport-reject");
        assert_eq!(parsed.to, jid(FOCUS));
        assert_eq!(parsed.contents.len(), 1);

        let events = h.events.events.lock().unwrap().clone();
        let Some(Event::TransportRenegotiationFailed(outcome)) = events.last() else {
            panic!("expected failure event, got {:?}", h.events.names());
        };
        assert_eq!(outcome.epoch, 1);
        assert!(outcome.error.as_deref().unwrap().contains("ICE failed"));

        // the call survives a failed renegotiation
        assert_eq!(h.state("s1"), Some(SessionState::Active));
        let analytics = h.analytics.events.lock().unwrap().clone();
        assert_eq!(analytics.len(), 1);
        assert!(!analytics[0].p2p);
    }

    #[tokio::test]
    async fn test_completion_after_termination_is_noop() {
        let mut h = harness();
        h.active_incoming(FOCUS, "s1").await;
        h.inbound(jingle_iq("r1", FOCUS, "transport-replace", "s1", vec![]))
            .await;
        h.inbound(jingle_iq("t", FOCUS, "session-terminate", "s1", vec![]))
            .await;

        let completion = h.completions.recv().await.unwrap();
        assert!(!h.dispatcher.complete_renegotiation(completion).await);
        assert_eq!(h.events.names().last(), Some(&"call-ended"));
    }

    // ================================================================
    // Diagnostics
    // ================================================================

    #[tokio::test]
    async fn test_sessions_snapshot_serializes() {
        let mut h = harness();
        h.inbound(initiate("a", FOCUS, "s1")).await;
        h.dispatcher.open_session(jid(ME), jid(PEER)).unwrap();

        let snapshot = h.dispatcher.sessions_snapshot();
        assert_eq!(snapshot.len(), 2);

        let json = serde_json::to_value(&snapshot).unwrap();
        let relayed = json
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["sid"] == "s1")
            .unwrap();
        assert_eq!(relayed["routing"], "relayed");
        assert_eq!(relayed["role"], "responder");
        assert_eq!(relayed["state"], "pending");
        assert_eq!(relayed["remote"], FOCUS);

        h.inbound(jingle_iq("t", FOCUS, "session-terminate", "s1", vec![]))
            .await;
        // the earlier snapshot is unaffected by the removal
        assert_eq!(snapshot.len(), 2);
        assert_eq!(h.dispatcher.sessions_snapshot().len(), 1);
    }
}
