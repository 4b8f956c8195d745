//! In-memory session store.
//!
//! Sessions live in a map of individually locked entries. The map lock is
//! held only long enough to find or insert an entry, so turns for different
//! sessions never wait on each other. Nothing is persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};

use robobrain_core::types::{Role, Session, SessionUpdate, Turn};

use crate::error::ChatError;

type Entry = Arc<Mutex<Session>>;

fn poisoned(what: &str) -> ChatError {
    ChatError::Storage(format!("{} lock poisoned", what))
}

/// Process-local store of conversation sessions.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    history_limit: usize,
}

impl SessionStore {
    /// Create an empty store that keeps at most `history_limit` turns per session.
    pub fn new(history_limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history_limit,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    fn existing(&self, session_id: &str) -> Result<Option<Entry>, ChatError> {
        let sessions = self.sessions.read().map_err(|_| poisoned("session map"))?;
        Ok(sessions.get(session_id).cloned())
    }

    fn entry(&self, session_id: &str) -> Result<Entry, ChatError> {
        if let Some(entry) = self.existing(session_id)? {
            return Ok(entry);
        }
        let mut sessions = self.sessions.write().map_err(|_| poisoned("session map"))?;
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(session_id, "Created session");
                Arc::new(Mutex::new(Session::new(session_id)))
            })
            .clone();
        Ok(entry)
    }

    /// Run `f` on the session under its lock, creating the session if absent.
    pub fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, ChatError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().map_err(|_| poisoned("session"))?;
        Ok(f(&mut session))
    }

    /// Create the session if absent and merge the provided fields.
    pub fn upsert(&self, session_id: &str, update: SessionUpdate) -> Result<Session, ChatError> {
        let session = self.update(session_id, |session| {
            session.apply(update);
            session.clone()
        })?;
        debug!(session_id, "Session context updated");
        Ok(session)
    }

    /// Current state of a session.
    pub fn get(&self, session_id: &str) -> Result<Session, ChatError> {
        let entry = self
            .existing(session_id)?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        let session = entry.lock().map_err(|_| poisoned("session"))?;
        Ok(session.clone())
    }

    /// Append a turn, creating the session if absent, and trim history to the bound.
    pub fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Session, ChatError> {
        let limit = self.history_limit;
        self.update(session_id, |session| {
            session.push_turn(Turn::new(role, text), limit);
            session.clone()
        })
    }

    /// Append a turn to a session that must already exist.
    ///
    /// Returns `SessionNotFound` if the session was cleared in the meantime;
    /// the session is not recreated.
    pub fn append_existing(
        &self,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<Session, ChatError> {
        let entry = self
            .existing(session_id)?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        let mut session = entry.lock().map_err(|_| poisoned("session"))?;
        session.push_turn(Turn::new(role, text), self.history_limit);
        Ok(session.clone())
    }

    /// Remove a session.
    pub fn delete(&self, session_id: &str) -> Result<(), ChatError> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned("session map"))?;
        match sessions.remove(session_id) {
            Some(_) => {
                info!(session_id, "Cleared session");
                Ok(())
            }
            None => Err(ChatError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        match self.sessions.read() {
            Ok(sessions) => sessions.len(),
            Err(poison) => {
                warn!("Session map lock poisoned while counting sessions");
                poison.into_inner().len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robobrain_core::types::EnvValue;
    use std::collections::BTreeMap;
    use std::thread;

    #[test]
    fn test_get_unknown_session() {
        let store = SessionStore::new(10);
        let err = store.get("missing").unwrap_err();
        assert!(matches!(err, ChatError::SessionNotFound(ref id) if id == "missing"));
    }

    #[test]
    fn test_upsert_creates_and_merges() {
        let store = SessionStore::new(10);
        store
            .upsert(
                "s1",
                SessionUpdate {
                    student_id: Some("STD001".into()),
                    student_name: Some("สมหญิง".into()),
                    ..SessionUpdate::default()
                },
            )
            .unwrap();
        let created_at = store.get("s1").unwrap().created_at;

        let session = store
            .upsert(
                "s1",
                SessionUpdate {
                    location: Some("โรงอาหาร".into()),
                    environment: Some(BTreeMap::from([(
                        "noise_level".to_string(),
                        EnvValue::Integer(65),
                    )])),
                    ..SessionUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(session.student_id.as_deref(), Some("STD001"));
        assert_eq!(session.student_name.as_deref(), Some("สมหญิง"));
        assert_eq!(session.current_location.as_deref(), Some("โรงอาหาร"));
        assert_eq!(session.created_at, created_at);
        assert!(session.last_updated >= created_at);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_append_turn_creates_session_and_bounds_history() {
        let store = SessionStore::new(4);
        for i in 0..9 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            let session = store.append_turn("s1", role, &format!("turn {}", i)).unwrap();
            assert!(session.history.len() <= 4);
        }
        let session = store.get("s1").unwrap();
        assert_eq!(session.history.len(), 4);
        assert_eq!(session.history[0].text, "turn 5");
        assert_eq!(session.history[3].text, "turn 8");
    }

    #[test]
    fn test_delete() {
        let store = SessionStore::new(10);
        store.append_turn("s1", Role::User, "hi").unwrap();
        store.delete("s1").unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.delete("s1").unwrap_err(),
            ChatError::SessionNotFound(_)
        ));
    }

    #[test]
    fn test_append_existing_does_not_recreate_cleared_session() {
        let store = SessionStore::new(10);
        store.append_turn("s1", Role::User, "hi").unwrap();

        let session = store.append_existing("s1", Role::Assistant, "hello").unwrap();
        assert_eq!(session.history.len(), 2);

        store.delete("s1").unwrap();
        let err = store
            .append_existing("s1", Role::Assistant, "late")
            .unwrap_err();
        assert!(matches!(err, ChatError::SessionNotFound(ref id) if id == "s1"));
        assert!(store.get("s1").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_len_counts_sessions_after_poisoned_lock() {
        let store = Arc::new(SessionStore::new(10));
        store.append_turn("s1", Role::User, "hi").unwrap();
        store.append_turn("s2", Role::User, "hi").unwrap();

        let poisoner = Arc::clone(&store);
        let _ = thread::spawn(move || {
            let _guard = poisoner.sessions.write().unwrap();
            panic!("poison the session map");
        })
        .join();

        assert!(store.sessions.is_poisoned());
        assert_eq!(store.len(), 2);
        assert!(matches!(
            store.get("s1").unwrap_err(),
            ChatError::Storage(_)
        ));
    }

    #[test]
    fn test_concurrent_appends_are_atomic() {
        let store = Arc::new(SessionStore::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store
                            .append_turn("shared", Role::User, &format!("{}-{}", t, i))
                            .unwrap();
                        store
                            .append_turn(&format!("own-{}", t), Role::User, "x")
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("shared").unwrap().history.len(), 400);
        assert_eq!(store.len(), 9);
    }
}
