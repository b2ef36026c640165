use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::StoredMessage;

struct Session {
    messages: Vec<StoredMessage>,
    last_active: DateTime<Utc>,
    /// Bumped by every clear
    generation: u64,
}

impl Session {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            last_active: Utc::now(),
            generation: 0,
        }
    }
}

/// Per-browser chat transcripts, kept in memory
///
/// Sessions idle longer than the TTL are dropped; when the store is full the
/// least recently active session is evicted.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl_secs: u64, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000)),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Return a live session id, creating a session when `id` is unknown or expired
    pub async fn resolve(&self, id: Option<Uuid>) -> Uuid {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        if let Some(id) = id {
            let live = sessions
                .get(&id)
                .map(|s| now - s.last_active <= self.ttl);
            match live {
                Some(true) => {
                    if let Some(session) = sessions.get_mut(&id) {
                        session.last_active = now;
                    }
                    return id;
                }
                Some(false) => {
                    debug!("Session {} expired", id);
                    sessions.remove(&id);
                }
                None => {}
            }
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_active)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                debug!("Session store full, evicting {}", oldest);
                sessions.remove(&oldest);
            }
        }

        let id = Uuid::new_v4();
        sessions.insert(id, Session::new());
        id
    }

    /// Append to a live session and return its current generation
    ///
    /// Sessions are only created by `resolve`; an evicted or expired id yields `None`.
    pub async fn append(&self, id: Uuid, message: StoredMessage) -> Option<u64> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id)?;
        session.messages.push(message);
        session.last_active = Utc::now();
        Some(session.generation)
    }

    /// Append only if the session still exists and was not cleared since `generation`
    pub async fn append_in_generation(&self, id: Uuid, generation: u64, message: StoredMessage) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if session.generation == generation => {
                session.messages.push(message);
                session.last_active = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub async fn history(&self, id: Uuid) -> Vec<StoredMessage> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Empty a session's transcript; the session itself stays
    pub async fn clear(&self, id: Uuid) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.messages.clear();
            session.generation += 1;
            session.last_active = Utc::now();
        }
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop idle sessions; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.purge_idle_since(Utc::now() - self.ttl).await
    }

    async fn purge_idle_since(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active >= cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Purged {} idle sessions", removed);
        }
        removed
    }
}
