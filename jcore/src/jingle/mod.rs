//! Jingle (XEP-0166) signaling vocabulary: actions, IQ parsing/building and
//! acknowledgements.

pub mod ack;
pub mod action;
pub mod stanza;

pub use ack::{Ack, AckErrorKind, AckOutcome, build_ack_error, build_ack_result};
pub use action::JingleAction;
pub use stanza::{JingleIqBuilder, ParsedJingleIq, StanzaError};

pub const NS_JINGLE: &str = "urn:xmpp:jingle:1";
pub const NS_JINGLE_ERRORS: &str = "urn:xmpp:jingle:errors:1";
pub const NS_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
pub const NS_STARTMUTED: &str = "http://jitsi.org/jitmeet/start-muted";
