//! Session registry: identifier → live session.

use super::error::SessionError;
use super::session::{JingleSession, SessionSnapshot};
use jcore::types::session::SessionId;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Owns every live session. Identifiers of removed sessions are retired and
/// never accepted again.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, JingleSession>,
    retired: HashSet<SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session` under its own identifier. Fails when the identifier
    /// is live or retired; the existing entry is left untouched.
    pub fn create(&mut self, session: JingleSession) -> Result<&mut JingleSession, SessionError> {
        let sid = session.sid().clone();
        if self.retired.contains(&sid) {
            return Err(SessionError::AlreadyExists(sid));
        }
        match self.sessions.entry(sid) {
            Entry::Occupied(e) => Err(SessionError::AlreadyExists(e.key().clone())),
            Entry::Vacant(e) => Ok(e.insert(session)),
        }
    }

    pub fn lookup(&self, sid: &SessionId) -> Result<&JingleSession, SessionError> {
        self.sessions
            .get(sid)
            .ok_or_else(|| SessionError::NotFound(sid.clone()))
    }

    pub fn lookup_mut(&mut self, sid: &SessionId) -> Result<&mut JingleSession, SessionError> {
        self.sessions
            .get_mut(sid)
            .ok_or_else(|| SessionError::NotFound(sid.clone()))
    }

    /// Removes the session and retires its identifier.
    pub fn remove(&mut self, sid: &SessionId) -> Result<JingleSession, SessionError> {
        let session = self
            .sessions
            .remove(sid)
            .ok_or_else(|| SessionError::NotFound(sid.clone()))?;
        self.retired.insert(sid.clone());
        Ok(session)
    }

    pub fn contains(&self, sid: &SessionId) -> bool {
        self.sessions.contains_key(sid)
    }

    pub fn is_retired(&self, sid: &SessionId) -> bool {
        self.retired.contains(sid)
    }

    /// A fresh identifier that is neither live nor retired.
    pub fn generate_id(&self) -> SessionId {
        loop {
            let sid = SessionId::generate();
            if !self.contains(&sid) && !self.is_retired(&sid) {
                return sid;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut out: Vec<SessionSnapshot> =
            self.sessions.values().map(JingleSession::snapshot).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }
}
