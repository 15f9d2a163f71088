//! Per-session resolution state.
//!
//! A question can take several dialog round-trips. Between them the
//! half-resolved [`Query`] and the dialog the user is answering live in a
//! [`SessionContext`], kept by a [`SessionStore`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::model::{Query, SuggestionPair};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub query: Query,
    /// Dialog waiting for a vote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<SuggestionPair>,
}

impl SessionContext {
    pub fn new(query: Query) -> Self {
        Self { query, pair: None }
    }
}

/// Fresh random session id.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub trait SessionStore {
    fn get(&self, session: &str) -> SessionResult<Option<SessionContext>>;
    fn set(&self, session: &str, context: &SessionContext) -> SessionResult<()>;
    fn clear(&self, session: &str) -> SessionResult<()>;
}

/// Sessions held in process memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionContext>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionContext>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session: &str) -> SessionResult<Option<SessionContext>> {
        Ok(self.sessions().get(session).cloned())
    }

    fn set(&self, session: &str, context: &SessionContext) -> SessionResult<()> {
        self.sessions().insert(session.to_string(), context.clone());
        Ok(())
    }

    fn clear(&self, session: &str) -> SessionResult<()> {
        self.sessions().remove(session);
        Ok(())
    }
}

/// One JSON file per session inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Session ids become file names; anything outside `[A-Za-z0-9_-]` is replaced.
    fn file(&self, session: &str) -> PathBuf {
        let name: String = session
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn io(path: &Path, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, session: &str) -> SessionResult<Option<SessionContext>> {
        let path = self.file(session);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path).map_err(|e| Self::io(&path, e))?;
        let context = serde_json::from_str(&data).map_err(|e| SessionError::Serialization {
            message: format!("parse {}: {e}", path.display()),
        })?;
        Ok(Some(context))
    }

    fn set(&self, session: &str, context: &SessionContext) -> SessionResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io(&self.dir, e))?;
        let path = self.file(session);
        let json = serde_json::to_string_pretty(context).map_err(|e| SessionError::Serialization {
            message: format!("serialize session {session}: {e}"),
        })?;
        std::fs::write(&path, json).map_err(|e| Self::io(&path, e))
    }

    fn clear(&self, session: &str) -> SessionResult<()> {
        let path = self.file(session);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::tree::ParseTree;

    fn context() -> SessionContext {
        let tree = ParseTree::parse("(ROOT (NP (NNS cities)))").unwrap();
        SessionContext::new(Query::new(tree))
    }

    #[test]
    fn memory_store_set_get_clear() {
        let store = MemorySessionStore::new();
        assert!(store.get("a").unwrap().is_none());
        store.set("a", &context()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(context()));
        store.clear("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        store.clear("a").unwrap();
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions"));
        store.set("../escape", &context()).unwrap();
        assert!(dir.path().join("sessions").join("___escape.json").exists());

        let reopened = FileSessionStore::new(dir.path().join("sessions"));
        assert_eq!(reopened.get("../escape").unwrap(), Some(context()));
        reopened.clear("../escape").unwrap();
        assert!(reopened.get("../escape").unwrap().is_none());
    }

    #[test]
    fn corrupt_session_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("s1.json"), "{ not json").unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(matches!(store.get("s1"), Err(SessionError::Serialization { .. })));
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
