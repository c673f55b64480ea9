use crate::jid::JidError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum XmlError {
    #[error("Attribute parsing failed: {0}")]
    AttrParse(String),
    #[error("JID parsing error: {0}")]
    Jid(#[from] JidError),
    #[error("Multiple attribute parsing errors: {0:?}")]
    AttrList(Vec<XmlError>),
}

pub type Result<T> = std::result::Result<T, XmlError>;
