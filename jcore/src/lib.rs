pub mod ice;
pub mod iq;
pub mod jid;
pub mod jingle;
pub mod sdp;
pub mod types;
pub mod xml;
