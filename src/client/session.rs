/// Client session state and its durable storage.
///
/// Only `user` and `isAuthenticated` are persisted. The access token stays in
/// memory; the HTTP-only cookie is what the server trusts.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::client::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<SessionUser>,
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
}

/// Durable home of the persisted part of a `Session`
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<Session>, ClientError>;
    fn save(&self, session: &Session) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON file on disk
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<Session>, ClientError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClientError::Storage(e.to_string())),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ClientError::Storage(e.to_string()))
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        let contents =
            serde_json::to_string(session).map_err(|e| ClientError::Storage(e.to_string()))?;
        fs::write(&self.path, contents).map_err(|e| ClientError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(e.to_string())),
        }
    }
}

/// Keeps the serialized session in memory
#[derive(Default)]
pub struct MemorySessionStorage {
    contents: Mutex<Option<String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The exact text that would have been written to durable storage
    pub fn raw(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<Session>, ClientError> {
        match self.raw() {
            Some(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|e| ClientError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        let contents =
            serde_json::to_string(session).map_err(|e| ClientError::Storage(e.to_string()))?;
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents);
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// The client's session, passed explicitly to networking code.
///
/// Storage failures are logged; the in-memory state stays authoritative.
pub struct SessionStore {
    state: RwLock<Session>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// Rehydrate from `storage`, starting signed-out if nothing usable is stored
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let session = match storage.load() {
            Ok(Some(session)) => session,
            Ok(None) => Session::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                Session::default()
            }
        };

        Self {
            state: RwLock::new(session),
            storage,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    pub fn set_auth(&self, user: SessionUser, access_token: String) {
        let session = Session {
            user: Some(user),
            access_token: Some(access_token),
            is_authenticated: true,
        };
        self.persist(&session);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub fn set_access_token(&self, access_token: String) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token = Some(access_token);
    }

    /// Clear memory and durable storage
    pub fn logout(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Session::default();
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.storage.save(session) {
            tracing::warn!(error = %e, "Failed to persist session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            id: 1,
            email: "a@u.edu".to_string(),
            role: Role::Student,
            full_name: "Ada Student".to_string(),
        }
    }

    #[test]
    fn test_set_auth_and_logout() {
        let store = SessionStore::new(Arc::new(MemorySessionStorage::new()));
        assert!(!store.is_authenticated());

        store.set_auth(user(), "token-1".to_string());
        assert!(store.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("token-1"));

        store.set_access_token("token-2".to_string());
        assert_eq!(store.access_token().as_deref(), Some("token-2"));

        store.logout();
        assert_eq!(store.snapshot(), Session::default());
    }

    #[test]
    fn test_access_token_is_not_persisted() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionStore::new(storage.clone());

        store.set_auth(user(), "secret-access-token".to_string());

        let raw = storage.raw().expect("session was not persisted");
        assert!(!raw.contains("secret-access-token"));
        assert!(raw.contains("\"isAuthenticated\":true"));
    }

    #[test]
    fn test_rehydrates_user_without_token() {
        let storage = Arc::new(MemorySessionStorage::new());
        SessionStore::new(storage.clone()).set_auth(user(), "t".to_string());

        let rehydrated = SessionStore::new(storage);
        assert!(rehydrated.is_authenticated());
        assert_eq!(rehydrated.user(), Some(user()));
        assert!(rehydrated.access_token().is_none());
    }

    #[test]
    fn test_logout_clears_storage() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionStore::new(storage.clone());
        store.set_auth(user(), "t".to_string());

        store.logout();

        assert!(storage.raw().is_none());
    }

    #[test]
    fn test_file_storage() {
        let path = std::env::temp_dir().join(format!("ucms-session-{}.json", uuid::Uuid::new_v4()));
        let storage = Arc::new(FileSessionStorage::new(&path));

        assert!(storage.load().unwrap().is_none());

        let store = SessionStore::new(storage.clone());
        store.set_auth(user(), "t".to_string());
        let loaded = storage.load().unwrap().expect("nothing on disk");
        assert_eq!(loaded.user, Some(user()));

        store.logout();
        assert!(!path.exists());
        assert!(storage.clear().is_ok());
    }

    #[test]
    fn test_corrupt_storage_starts_signed_out() {
        let path = std::env::temp_dir().join(format!("ucms-session-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::new(Arc::new(FileSessionStorage::new(&path)));
        assert!(!store.is_authenticated());

        std::fs::remove_file(&path).unwrap();
    }
}
