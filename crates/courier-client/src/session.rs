//! Session store.
//!
//! Tracks whether the user is signed in and owns the persisted token. Only
//! the token survives a restart; a restored session therefore has no user
//! record until the next login.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use courier_shared::constants::TOKEN_KEY;
use courier_shared::protocol::LoginResponse;
use courier_shared::{CourierError, Result, User, UserId};
use courier_store::Database;

/// Durable key-value slot for the session token.
pub trait TokenStore: Send {
    fn load(&self) -> Result<Option<String>>;
    fn save(&mut self, token: &str) -> Result<()>;
    /// Returns whether a token was present.
    fn clear(&mut self) -> Result<bool>;
}

impl TokenStore for Database {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.get_credential(TOKEN_KEY)?.map(|c| c.value))
    }

    fn save(&mut self, token: &str) -> Result<()> {
        Ok(self.set_credential(TOKEN_KEY, token)?)
    }

    fn clear(&mut self) -> Result<bool> {
        Ok(self.remove_credential(TOKEN_KEY)?)
    }
}

/// In-memory token slot for `--ephemeral` runs and tests.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    /// Current contents of the slot.
    pub fn peek(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.slot
            .lock()
            .map_err(|e| CourierError::Storage(format!("Lock poisoned: {e}")))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn save(&mut self, token: &str) -> Result<()> {
        *self.slot()? = Some(token.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<bool> {
        Ok(self.slot()?.take().is_some())
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// `None` when restored from a stored token.
    pub user: Option<User>,
    pub token: String,
}

pub struct SessionStore {
    store: Box<dyn TokenStore>,
    session: Option<Session>,
}

impl SessionStore {
    /// Read the stored token once. Its presence is taken as authenticated
    /// until the backend says otherwise.
    pub fn open(store: Box<dyn TokenStore>) -> Result<Self> {
        let session = store.load()?.map(|token| Session { user: None, token });
        if session.is_some() {
            info!("Restored session from stored token");
        }
        Ok(Self { store, session })
    }

    /// Persist the token and mark the session authenticated.
    pub fn login(&mut self, response: LoginResponse) -> Result<Session> {
        self.store.save(&response.token)?;
        let session = Session {
            user: Some(response.user),
            token: response.token,
        };
        info!(user = %session.user.as_ref().map(|u| u.id.short()).unwrap_or(""), "Session started");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Remove the stored token and mark the session unauthenticated.
    pub fn logout(&mut self) -> Result<bool> {
        self.session = None;
        let had_token = self.store.clear()?;
        info!(had_token, "Session ended");
        Ok(had_token)
    }

    /// Drop a token the backend rejected.
    pub fn invalidate(&mut self) {
        warn!("Session token rejected, signing out");
        if let Err(e) = self.logout() {
            warn!(error = %e, "Failed to clear rejected token");
        }
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref().and_then(|s| s.user.as_ref())
    }

    pub fn own_id(&self) -> Option<&UserId> {
        self.current_user().map(|u| &u.id)
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: UserId::new("u-alice"),
            name: "Alice".into(),
            email: "alice@example.org".into(),
            profile_pic: None,
        }
    }

    #[test]
    fn test_no_token_is_unauthenticated() {
        let store = SessionStore::open(Box::new(MemoryTokenStore::default())).unwrap();
        assert!(!store.is_authenticated());
        assert!(store.current_session().is_none());
    }

    #[test]
    fn test_stored_token_restores_without_user() {
        let store = SessionStore::open(Box::new(MemoryTokenStore::with_token("t1"))).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.token(), Some("t1"));
        assert!(store.current_user().is_none());
    }

    #[test]
    fn test_login_persists_token() {
        let slot = MemoryTokenStore::default();
        let mut store = SessionStore::open(Box::new(slot.clone())).unwrap();

        let session = store
            .login(LoginResponse {
                user: alice(),
                token: "fresh".into(),
            })
            .unwrap();

        assert!(store.is_authenticated());
        assert_eq!(session.token, "fresh");
        assert_eq!(slot.peek().as_deref(), Some("fresh"));
        assert_eq!(store.own_id(), Some(&UserId::new("u-alice")));
    }

    #[test]
    fn test_logout_clears_token() {
        let slot = MemoryTokenStore::with_token("t1");
        let mut store = SessionStore::open(Box::new(slot.clone())).unwrap();

        assert!(store.logout().unwrap());
        assert!(!store.is_authenticated());
        assert!(slot.peek().is_none());
        assert!(!store.logout().unwrap());
    }

    #[test]
    fn test_database_backed_session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.db");

        {
            let db = Database::open_at(&path).unwrap();
            let mut store = SessionStore::open(Box::new(db)).unwrap();
            store
                .login(LoginResponse {
                    user: alice(),
                    token: "durable".into(),
                })
                .unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        let mut store = SessionStore::open(Box::new(db)).unwrap();
        assert_eq!(store.token(), Some("durable"));

        store.invalidate();
        let db = Database::open_at(&path).unwrap();
        assert!(TokenStore::load(&db).unwrap().is_none());
    }
}
