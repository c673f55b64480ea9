//! Jingle session lifecycle.
//!
//! # Architecture
//!
//! - [`JingleSession`]: per-peer state machine (pending → active → ended)
//! - [`SessionRegistry`]: identifier → live session, with retired identifiers
//! - [`SignalingDispatcher`]: validates and routes inbound stanzas, sends one
//!   ack per stanza, and runs local open/accept/terminate requests
//! - [`TransportEngine`], [`StanzaSender`], [`AnalyticsSink`]: collaborators

pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod session;
pub mod traits;

mod protocol_tests;

pub use dispatcher::{Collaborators, RenegotiationCompletion, SignalingDispatcher};
pub use error::{SessionError, TransportError};
pub use registry::SessionRegistry;
pub use session::{InvalidTransition, JingleSession, SessionSnapshot, SessionTransition};
pub use traits::{AnalyticsEvent, AnalyticsSink, NoopAnalytics, StanzaSender, TransportEngine};
