pub mod attrs;
pub mod builder;
mod display;
pub mod error;
pub mod node;

pub use builder::NodeBuilder;
pub use display::DisplayableNode;
pub use error::{Result, XmlError};
pub use node::{Attrs, Node, NodeContent};
