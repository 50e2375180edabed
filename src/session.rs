//! In-memory session state store.
//!
//! Holds bounded conversation history per session id for the process
//! lifetime. No persistence across restarts; that is an accepted limitation
//! of the design, not a defect. The store is an explicitly-owned object so
//! it can be swapped for a persistent backend without touching the engine.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use uuid::Uuid;

/// Speaker role of a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One retained turn of conversation.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

/// Process-lifetime store of per-session conversation history.
///
/// Each remembered exchange is one user turn plus one assistant turn, so at
/// most `2 * max_history` turns are retained per session; the oldest turns
/// are evicted first. Sessions are created lazily on first append and are
/// fully independent of each other.
pub struct SessionStore {
    max_history: usize,
    sessions: RwLock<HashMap<String, VecDeque<HistoryTurn>>>,
}

impl SessionStore {
    /// Create a store retaining up to `max_history` exchanges per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Generate an opaque session identifier for callers without one.
    pub fn new_session_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Retained history for a session, oldest first. Empty if unseen.
    pub fn history(&self, session_id: &str) -> Vec<HistoryTurn> {
        let sessions = self.sessions.read().unwrap();
        sessions
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append one completed exchange, evicting the oldest turns once the
    /// retention bound is exceeded.
    pub fn append_exchange(&self, session_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().unwrap();
        let turns = sessions.entry(session_id.to_string()).or_default();

        turns.push_back(HistoryTurn {
            role: Role::User,
            content: user.to_string(),
        });
        turns.push_back(HistoryTurn {
            role: Role::Assistant,
            content: assistant.to_string(),
        });

        while turns.len() > 2 * self.max_history {
            turns.pop_front();
        }
    }

    /// Drop a session's history entirely.
    pub fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(session_id);
    }
}
