//! Session state and the token providers a client can be built with.
//!
//! A [`RigClient`](crate::client::RigClient) reads its bearer token through a
//! [`TokenStore`] once per request and writes it only on login or when the
//! session is cleared. Two providers exist:
//! - [`MemoryTokenStore`]: the token lives in the client instance.
//! - [`KeyValueTokenStore`]: the token lives in a durable [`KeyValueStore`]
//!   shared with the hosting environment under the `authToken` and
//!   `currentUser` keys.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Key holding the bearer token in a durable store.
pub const AUTH_TOKEN_KEY: &str = "authToken";
/// Key holding the logged-in username in a durable store.
pub const CURRENT_USER_KEY: &str = "currentUser";

/// Credentials captured from a successful login.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: SecretString,
    pub username: Option<String>,
}

impl Session {
    pub fn new(token: SecretString, username: Option<String>) -> Self {
        Self { token, username }
    }

    /// Extracts a session from a login payload.
    ///
    /// Returns `None` when the payload has no non-empty string `token`.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        #[derive(Deserialize)]
        struct LoginPayload {
            token: String,
            #[serde(default)]
            username: Option<String>,
        }

        let parsed = LoginPayload::deserialize(payload).ok()?;
        if parsed.token.is_empty() {
            return None;
        }
        Some(Self {
            token: SecretString::new(parsed.token),
            username: parsed.username,
        })
    }
}

/// Errors raised while reading or persisting session state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store i/o: {0}")]
    Io(#[from] io::Error),

    #[error("session store is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session store lock poisoned")]
    Poisoned,
}

/// Source of the bearer token for a client instance.
///
/// `token` is called once at the start of every request. `store_session` is
/// the only writer on the login path.
pub trait TokenStore: Send + Sync {
    fn token(&self) -> Result<Option<SecretString>, StoreError>;

    fn username(&self) -> Result<Option<String>, StoreError>;

    fn store_session(&self, session: &Session) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

impl<S: TokenStore> TokenStore for Arc<S> {
    fn token(&self) -> Result<Option<SecretString>, StoreError> {
        (**self).token()
    }

    fn username(&self) -> Result<Option<String>, StoreError> {
        (**self).username()
    }

    fn store_session(&self, session: &Session) -> Result<(), StoreError> {
        (**self).store_session(session)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// Token held purely in instance state.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: RwLock<Option<Session>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SecretString) -> Self {
        Self {
            session: RwLock::new(Some(Session::new(token, None))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn token(&self) -> Result<Option<SecretString>, StoreError> {
        let guard = self.session.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard
            .as_ref()
            .map(|session| session.token.clone())
            .filter(|token| !token.expose_secret().is_empty()))
    }

    fn username(&self) -> Result<Option<String>, StoreError> {
        let guard = self.session.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.as_ref().and_then(|session| session.username.clone()))
    }

    fn store_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut guard = self.session.write().map_err(|_| StoreError::Poisoned)?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.session.write().map_err(|_| StoreError::Poisoned)?;
        *guard = None;
        Ok(())
    }
}

/// String key-value persistence shared with the hosting environment.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<K: KeyValueStore> KeyValueStore for Arc<K> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Token read from and written to a [`KeyValueStore`].
///
/// The token is pulled from the store at call time, so a login performed by
/// another client sharing the same store is picked up on the next request.
#[derive(Debug)]
pub struct KeyValueTokenStore<K> {
    store: K,
    // Keeps the two-key login write atomic with respect to other writers
    // going through this provider.
    write_lock: Mutex<()>,
}

impl<K: KeyValueStore> KeyValueTokenStore<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &K {
        &self.store
    }
}

impl<K: KeyValueStore> TokenStore for KeyValueTokenStore<K> {
    fn token(&self) -> Result<Option<SecretString>, StoreError> {
        Ok(self
            .store
            .get(AUTH_TOKEN_KEY)?
            .filter(|token| !token.is_empty())
            .map(SecretString::new))
    }

    fn username(&self) -> Result<Option<String>, StoreError> {
        self.store.get(CURRENT_USER_KEY)
    }

    fn store_session(&self, session: &Session) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let previous_token = self.store.get(AUTH_TOKEN_KEY)?;
        self.store
            .set(AUTH_TOKEN_KEY, session.token.expose_secret())?;

        let user_write = match session.username.as_deref() {
            Some(username) => self.store.set(CURRENT_USER_KEY, username),
            None => self.store.remove(CURRENT_USER_KEY),
        };
        if let Err(err) = user_write {
            // Never leave the new token paired with the previous login's user.
            let restored = match previous_token.as_deref() {
                Some(token) => self.store.set(AUTH_TOKEN_KEY, token),
                None => self.store.remove(AUTH_TOKEN_KEY),
            };
            if let Err(restore_err) = restored {
                warn!(event = "session_store_rollback_failed", error = %restore_err);
            }
            return Err(err);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.store.remove(AUTH_TOKEN_KEY)?;
        self.store.remove(CURRENT_USER_KEY)
    }
}

/// In-process key-value store. Share it through an `Arc` to let the host and
/// the client observe the same entries.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Durable store backed by a single JSON object on disk.
///
/// A missing file reads as empty. Writes replace the file through a sibling
/// temporary file and a rename.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(event = "session_store_persisted", path = %self.path.display(), keys = entries.len());
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        apply(&mut entries);
        self.persist(&entries)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
