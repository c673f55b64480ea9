// Re-export the protocol core
pub use jcore;
pub use jcore::{iq, jid, types, xml};

pub mod actors;
pub mod config;
pub mod ice;
pub mod jingle;
pub mod request;
pub mod sdp;
