//! Jingle IQ parsing and building.
//!
//! Wire format:
//! ```xml
//! <iq type="set" from="room@conference.example.com/focus" to="room@.../me" id="...">
//!   <jingle xmlns="urn:xmpp:jingle:1" action="session-initiate" sid="..." initiator="...">
//!     <content name="audio">...</content>
//!     <startmuted audio="true" video="false"/>
//!   </jingle>
//! </iq>
//! ```

use super::action::JingleAction;
use super::{NS_JINGLE, NS_STARTMUTED};
use crate::jid::Jid;
use crate::types::events::StartMuted;
use crate::types::session::{SessionId, TerminationReason};
use crate::xml::{Node, NodeBuilder, XmlError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StanzaError {
    #[error("expected 'iq' tag, got '{0}'")]
    WrongTag(String),
    #[error("expected iq of type 'set', got '{0}'")]
    NotASet(String),
    #[error("iq has no jingle child")]
    MissingJingle,
    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),
    #[error("invalid attribute: {0}")]
    Attr(#[from] XmlError),
}

/// A parsed inbound Jingle IQ.
#[derive(Debug, Clone)]
pub struct ParsedJingleIq {
    /// Stanza id, echoed by the acknowledgement.
    pub stanza_id: String,
    pub from: Jid,
    pub to: Jid,
    pub sid: SessionId,
    /// Recognized action, `None` when `raw_action` is not in the vocabulary.
    pub action: Option<JingleAction>,
    pub raw_action: String,
    pub initiator: Option<Jid>,
    pub contents: Vec<Node>,
    pub start_muted: Option<StartMuted>,
    pub reason: Option<TerminationReason>,
    /// The whole `<jingle>` element, for collaborators that need more than
    /// the contents (transport-info).
    pub jingle: Node,
}

impl ParsedJingleIq {
    pub fn parse(node: &Node) -> Result<Self, StanzaError> {
        if node.tag != "iq" {
            return Err(StanzaError::WrongTag(node.tag.clone()));
        }

        let mut attrs = node.attrs();
        let iq_type = attrs.optional_string("type").unwrap_or_default();
        if iq_type != "set" {
            return Err(StanzaError::NotASet(iq_type.to_string()));
        }
        let stanza_id = attrs.string("id");
        let from = attrs.jid("from");
        let to = attrs.optional_jid("to").unwrap_or_default();
        attrs.finish()?;

        let jingle = node
            .get_optional_child("jingle")
            .ok_or(StanzaError::MissingJingle)?;

        let mut j_attrs = jingle.attrs();
        let sid = j_attrs
            .optional_string("sid")
            .filter(|s| !s.is_empty())
            .ok_or(StanzaError::MissingAttribute("sid"))?;
        let raw_action = j_attrs
            .optional_string("action")
            .filter(|s| !s.is_empty())
            .ok_or(StanzaError::MissingAttribute("action"))?
            .to_string();
        let initiator = j_attrs.optional_jid("initiator");
        j_attrs.finish()?;

        let contents = jingle
            .get_children_by_tag("content")
            .into_iter()
            .cloned()
            .collect();

        Ok(Self {
            stanza_id,
            from,
            to,
            sid: SessionId::new(sid),
            action: JingleAction::from_wire(&raw_action),
            raw_action,
            initiator,
            contents,
            start_muted: Self::parse_start_muted(jingle),
            reason: Self::parse_reason(jingle),
            jingle: jingle.clone(),
        })
    }

    fn parse_start_muted(jingle: &Node) -> Option<StartMuted> {
        let node = jingle.get_optional_child("startmuted")?;
        let mut attrs = node.attrs();
        Some(StartMuted {
            audio: attrs.optional_string("audio") == Some("true"),
            video: attrs.optional_string("video") == Some("true"),
        })
    }

    /// `<reason><CONDITION/><text>...</text></reason>`: the condition is the
    /// first child element.
    fn parse_reason(jingle: &Node) -> Option<TerminationReason> {
        let reason = jingle.get_optional_child("reason")?;
        let condition = reason
            .children()
            .and_then(|c| c.first())
            .map(|c| c.tag.clone());
        let text = reason
            .get_optional_child("text")
            .and_then(Node::text)
            .map(str::to_string);
        Some(TerminationReason { condition, text })
    }
}

/// Builder for outbound Jingle IQs.
pub struct JingleIqBuilder {
    id: Option<String>,
    sid: SessionId,
    action: JingleAction,
    from: Jid,
    to: Jid,
    initiator: Option<Jid>,
    responder: Option<Jid>,
    contents: Vec<Node>,
    reason: Option<TerminationReason>,
    start_muted: Option<StartMuted>,
}

impl JingleIqBuilder {
    pub fn new(sid: SessionId, action: JingleAction, from: Jid, to: Jid) -> Self {
        Self {
            id: None,
            sid,
            action,
            from,
            to,
            initiator: None,
            responder: None,
            contents: Vec::new(),
            reason: None,
            start_muted: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn initiator(mut self, jid: Jid) -> Self {
        self.initiator = Some(jid);
        self
    }

    pub fn responder(mut self, jid: Jid) -> Self {
        self.responder = Some(jid);
        self
    }

    pub fn contents(mut self, contents: impl IntoIterator<Item = Node>) -> Self {
        self.contents.extend(contents);
        self
    }

    pub fn reason(mut self, reason: TerminationReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn start_muted(mut self, state: StartMuted) -> Self {
        self.start_muted = Some(state);
        self
    }

    pub fn build(self) -> Node {
        let mut children = self.contents;

        if let Some(reason) = self.reason {
            let mut reason_children = Vec::new();
            if let Some(condition) = reason.condition {
                reason_children.push(NodeBuilder::new(condition).build());
            }
            if let Some(text) = reason.text {
                reason_children.push(NodeBuilder::new("text").text(text).build());
            }
            children.push(NodeBuilder::new("reason").children(reason_children).build());
        }

        if let Some(muted) = self.start_muted {
            children.push(
                NodeBuilder::new("startmuted")
                    .attr("xmlns", NS_STARTMUTED)
                    .attr("audio", muted.audio.to_string())
                    .attr("video", muted.video.to_string())
                    .build(),
            );
        }

        let mut jingle = NodeBuilder::new("jingle")
            .attr("xmlns", NS_JINGLE)
            .attr("action", self.action.as_str())
            .attr("sid", self.sid.as_str())
            .optional_attr("initiator", self.initiator.map(String::from))
            .optional_attr("responder", self.responder.map(String::from));
        if !children.is_empty() {
            jingle = jingle.children(children);
        }

        NodeBuilder::new("iq")
            .attr("type", "set")
            .attr("from", self.from.to_string())
            .attr("to", self.to.to_string())
            .optional_attr("id", self.id)
            .children([jingle.build()])
            .build()
    }
}
