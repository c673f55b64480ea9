use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resource name the conference focus joins a MUC room with.
pub const DEFAULT_RELAY_RESOURCE: &str = "focus";

#[derive(Debug, Clone, Error)]
pub enum JidError {
    #[error("Invalid JID format: {0}")]
    InvalidFormat(String),
}

/// An XMPP address: `[local@]domain[/resource]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    pub local: String,
    pub domain: String,
    pub resource: Option<String>,
}

impl Jid {
    pub fn new(local: &str, domain: &str) -> Self {
        Self {
            local: local.to_string(),
            domain: domain.to_string(),
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    /// The address without its resource part.
    pub fn to_bare(&self) -> Self {
        Self {
            local: self.local.clone(),
            domain: self.domain.clone(),
            resource: None,
        }
    }

    pub fn is_bare(&self) -> bool {
        self.resource.is_none()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, resource) = match s.split_once('/') {
            Some((r, res)) => (r, Some(res)),
            None => (s, None),
        };
        let (local, domain) = match rest.split_once('@') {
            Some((l, d)) => (l, d),
            None => ("", rest),
        };

        if domain.is_empty() {
            return Err(JidError::InvalidFormat(s.to_string()));
        }
        if rest.contains('@') && local.is_empty() {
            return Err(JidError::InvalidFormat(s.to_string()));
        }
        if resource.is_some_and(str::is_empty) {
            return Err(JidError::InvalidFormat(s.to_string()));
        }

        Ok(Jid {
            local: local.to_string(),
            domain: domain.to_string(),
            resource: resource.map(str::to_string),
        })
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.local.is_empty() {
            write!(f, "{}@", self.local)?;
        }
        write!(f, "{}", self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{}", resource)?;
        }
        Ok(())
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Jid::from_str(&value)
    }
}
