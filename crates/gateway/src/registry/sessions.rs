use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use toolgate_common::ids::{DiscoverySessionId, TenantId};
use toolgate_common::types::{Candidate, DiscoverySession, DiscoveryStatus};

/// Discovery Sessions are short-lived and never need to
/// survive a gateway restart, so they live in memory rather than in
/// PostgreSQL — unlike Tools and Execution Records, which must.
pub struct SessionStore {
    sessions: Mutex<HashMap<DiscoverySessionId, DiscoverySession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, session: DiscoverySession) -> DiscoverySessionId {
        let id = session.id;
        self.sessions
            .lock()
            .expect("session table lock poisoned")
            .insert(id, session);
        id
    }

    /// Returns `None` both when the session is missing and when it has
    /// expired — callers treat both as `not_found`.
    pub fn get(&self, id: DiscoverySessionId) -> Option<DiscoverySession> {
        let sessions = self.sessions.lock().expect("session table lock poisoned");
        let session = sessions.get(&id)?;
        if session.is_expired(Utc::now()) {
            return None;
        }
        Some(session.clone())
    }

    pub fn remove(&self, id: DiscoverySessionId) {
        self.sessions
            .lock()
            .expect("session table lock poisoned")
            .remove(&id);
    }

    /// Sweep expired sessions — called opportunistically on insert so the
    /// table doesn't grow unbounded between discoveries.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.sessions
            .lock()
            .expect("session table lock poisoned")
            .retain(|_, s| !s.is_expired(now));
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_owned_by(session: &DiscoverySession, tenant_id: TenantId) -> bool {
    session.tenant_id == tenant_id
}

pub fn pending_candidates(session: &DiscoverySession) -> Vec<Candidate> {
    if session.status == DiscoveryStatus::NeedsConfirmation {
        session.candidates.clone()
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_common::types::DiscoveryStatus;

    fn session(tenant_id: TenantId, ttl: chrono::Duration) -> DiscoverySession {
        let now = Utc::now();
        DiscoverySession {
            id: DiscoverySessionId::new(),
            tenant_id,
            base_url: "https://api.example.com".to_string(),
            tool_name: "example".to_string(),
            display_name: None,
            candidates: Vec::new(),
            status: DiscoveryStatus::NeedsConfirmation,
            selected_url: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[test]
    fn round_trips_a_live_session() {
        let store = SessionStore::new();
        let tenant_id = TenantId::new();
        let id = store.insert(session(tenant_id, chrono::Duration::seconds(60)));
        assert!(store.get(id).is_some());
    }

    #[test]
    fn expired_session_reads_as_missing() {
        let store = SessionStore::new();
        let tenant_id = TenantId::new();
        let id = store.insert(session(tenant_id, chrono::Duration::seconds(-1)));
        assert!(store.get(id).is_none());
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let store = SessionStore::new();
        let tenant_id = TenantId::new();
        let live = store.insert(session(tenant_id, chrono::Duration::seconds(60)));
        let dead = store.insert(session(tenant_id, chrono::Duration::seconds(-1)));
        store.sweep_expired();
        assert!(store.get(live).is_some());
        assert!(store.get(dead).is_none());
    }
}
