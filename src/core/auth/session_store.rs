use super::credentials::Identity;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Server-side login sessions, keyed by an unguessable id.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
        }
    }

    pub fn create(&self, identity: Identity) -> Session {
        let now = Utc::now();
        let session = Session {
            id: new_session_id(),
            identity,
            created_at: now,
            expires_at: now + self.lifetime,
        };
        // Sessions whose clients never came back are swept here.
        self.sessions.retain(|_, s| !s.is_expired(now));
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::info!(
            username = %session.identity.username,
            active = self.len(),
            "Session created"
        );
        session
    }

    /// Looks up a live session. Expired sessions are dropped on access.
    pub fn get(&self, id: &str) -> Option<Session> {
        let session = self.sessions.get(id)?.clone();
        if session.is_expired(Utc::now()) {
            self.sessions.remove(id);
            tracing::debug!("Dropped expired session");
            return None;
        }
        Some(session)
    }

    pub fn destroy(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
