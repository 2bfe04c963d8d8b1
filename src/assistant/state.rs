//! Per-turn session state, derived from the stored user record.
//!
//! Nothing here is persisted; the router computes it once at the start of
//! each turn and branches on the named states.

use crate::store::UserRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    NotConnected,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageContext {
    NoReferenceList,
    HasReferenceList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub connection: Connection,
    pub triage: TriageContext,
}

/// Compute the session state for a user.
pub fn derive_state(user: &UserRecord) -> SessionState {
    let connection = if user.credential.is_some() {
        Connection::Connected
    } else {
        Connection::NotConnected
    };
    let triage = if user.references.is_empty() {
        TriageContext::NoReferenceList
    } else {
        TriageContext::HasReferenceList
    };
    SessionState { connection, triage }
}
