pub mod messages;
pub mod signaling;

pub use messages::SignalingCommand;
pub use signaling::{SignalingActor, SignalingError, SignalingHandle};
