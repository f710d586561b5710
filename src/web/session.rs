//! Per-client sessions keyed by the `sid` cookie.

use crate::core::DocId;
use http::HeaderMap;
use http::header::COOKIE;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";

/// Session state visible to handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<DocId>,
}

/// Request-scoped handle to a session.
///
/// Clones share the same state, so a handler that logs a user in is seen by
/// the dispatcher when it writes the session back.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // Session holds plain data; a panic mid-write cannot leave it torn.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn user(&self) -> Option<DocId> {
        self.lock().user
    }

    pub fn set_user(&self, user: Option<DocId>) {
        self.lock().user = user;
    }

    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }
}

/// Server-side session table.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `sid`, or `None` for unknown ids.
    pub async fn load(&self, sid: &str) -> Option<Session> {
        self.sessions.read().await.get(sid).cloned()
    }

    pub async fn save(&self, sid: &str, session: Session) {
        self.sessions.write().await.insert(sid.to_string(), session);
    }

    pub async fn remove(&self, sid: &str) -> Option<Session> {
        self.sessions.write().await.remove(sid)
    }

    /// Records how a request left its session.
    ///
    /// Nothing is written when the session is unchanged, so a slow request
    /// cannot undo a login or logout that finished meanwhile. A session back
    /// at its default state is dropped. Returns true when `sid` now holds
    /// stored state.
    pub async fn commit(&self, sid: &str, loaded: &Session, current: Session) -> bool {
        if current == *loaded {
            return *loaded != Session::default();
        }
        if current == Session::default() {
            self.remove(sid).await;
            false
        } else {
            self.save(sid, current).await;
            true
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub fn new_sid() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Reads the session id from the request's `Cookie` headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(sid: &str) -> String {
    format!("{SESSION_COOKIE}={sid}; HttpOnly; Path=/; SameSite=Lax")
}
