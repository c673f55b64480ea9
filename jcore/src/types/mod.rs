pub mod events;
pub mod session;
