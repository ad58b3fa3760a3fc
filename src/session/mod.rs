//! Authenticated identity and bearer token, persisted across runs.
//!
//! A [`Session`] is built once at startup from a [`SessionStore`] and shared
//! (behind an `Arc`) with the API client. It owns the [`Navigator`] so that
//! logging out, including a forced logout on an expired token, always lands on
//! the login view.

use crate::api::models::{Role, User};
use crate::error::ClientError;
use crate::routes::{Navigator, Route};
use std::sync::RwLock;
use tracing::{debug, info, warn};

pub mod memory;
pub mod store;

use store::{SessionStore, StoreError, TOKEN_KEY, USER_KEY};

#[derive(Debug, Clone, Default, PartialEq)]
struct SessionState {
    user: Option<User>,
    token: Option<String>,
}

/// Fields a profile update may change; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub rol: Option<Role>,
}

impl From<User> for UserPatch {
    fn from(user: User) -> Self {
        Self {
            nombre: Some(user.nombre),
            email: Some(user.email),
            rol: Some(user.rol),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    store: Box<dyn SessionStore>,
    state: RwLock<SessionState>,
    navigator: Navigator,
}

impl Session {
    /// Restores a session from `store`. Both keys must be present; an unreadable
    /// user entry clears both.
    pub fn init(store: Box<dyn SessionStore>) -> Self {
        let state = match restore(store.as_ref()) {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "Failed to restore session, clearing stored credentials");
                if let Err(err) = clear(store.as_ref()) {
                    warn!(error = %err, "Failed to clear stored credentials");
                }
                SessionState::default()
            }
        };

        let initial = match &state.user {
            Some(user) => Route::landing_for(&user.rol),
            None => Route::Landing,
        };
        if let Some(user) = &state.user {
            info!(user_id = user.id, rol = %user.rol, "Session restored");
        }

        Self {
            store,
            state: RwLock::new(state),
            navigator: Navigator::new(initial),
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().ok().and_then(|s| s.user.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().ok().and_then(|s| s.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .map(|s| s.user.is_some() && s.token.is_some())
            .unwrap_or(false)
    }

    pub fn require_user(&self) -> Result<User, ClientError> {
        self.user().ok_or(ClientError::NotAuthenticated)
    }

    /// Stores the new identity and moves to the role's home view.
    pub fn login(&self, user: User, token: String) -> Result<Route, ClientError> {
        let serialized = serde_json::to_string(&user).map_err(StoreError::from)?;
        self.store.set(TOKEN_KEY, &token)?;
        self.store.set(USER_KEY, &serialized)?;

        let landing = Route::landing_for(&user.rol);
        info!(user_id = user.id, rol = %user.rol, "Signed in");
        {
            let mut state = self.state.write().map_err(|_| StoreError::Lock)?;
            state.user = Some(user);
            state.token = Some(token);
        }
        self.navigator.navigate(landing.clone());
        Ok(landing)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        {
            let mut state = self.state.write().map_err(|_| StoreError::Lock)?;
            *state = SessionState::default();
        }
        let cleared = clear(self.store.as_ref());
        self.navigator.navigate(Route::Login);
        info!("Signed out");
        cleared.map_err(ClientError::from)
    }

    /// Forced logout after the backend rejected `token`. Returns `false`, and
    /// leaves the session alone, when a newer login has replaced that token.
    pub fn expire(&self, token: &str) -> bool {
        {
            let Ok(mut state) = self.state.write() else {
                warn!("Session lock poisoned, cannot expire token");
                return false;
            };
            if state.token.as_deref() != Some(token) {
                debug!("Rejected token is no longer current, keeping session");
                return false;
            }
            *state = SessionState::default();
        }
        warn!("Token expired or invalid, signing out");
        if let Err(err) = clear(self.store.as_ref()) {
            warn!(error = %err, "Failed to clear session after expiry");
        }
        self.navigator.navigate(Route::Login);
        true
    }

    /// Merges `patch` into the current user and persists it; the token is kept.
    pub fn update_user(&self, patch: UserPatch) -> Result<User, ClientError> {
        let updated = {
            let mut state = self.state.write().map_err(|_| StoreError::Lock)?;
            let user = state.user.as_mut().ok_or(ClientError::NotAuthenticated)?;
            if let Some(nombre) = patch.nombre.filter(|n| !n.trim().is_empty()) {
                user.nombre = nombre;
            }
            if let Some(email) = patch.email.filter(|e| !e.trim().is_empty()) {
                user.email = email;
            }
            if let Some(rol) = patch.rol {
                user.rol = rol;
            }
            user.clone()
        };

        let serialized = serde_json::to_string(&updated).map_err(StoreError::from)?;
        self.store.set(USER_KEY, &serialized)?;
        info!(user_id = updated.id, "Session user updated");
        Ok(updated)
    }
}

fn restore(store: &dyn SessionStore) -> Result<SessionState, StoreError> {
    let token = store.get(TOKEN_KEY)?;
    let user = store.get(USER_KEY)?;
    match (token, user) {
        (Some(token), Some(user)) if !token.is_empty() => {
            let user: User = serde_json::from_str(&user)?;
            Ok(SessionState {
                user: Some(user),
                token: Some(token),
            })
        }
        _ => Ok(SessionState::default()),
    }
}

fn clear(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.remove(TOKEN_KEY)?;
    store.remove(USER_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::MemoryStore;

    fn owner() -> User {
        User {
            id: 7,
            nombre: "Olga".to_string(),
            email: "olga@example.com".to_string(),
            rol: Role::Duenio,
        }
    }

    #[test]
    fn init_restores_persisted_session() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::with_entries([
            (TOKEN_KEY, "tok".to_string()),
            (USER_KEY, serde_json::to_string(&owner())?),
        ]);
        let session = Session::init(Box::new(store));

        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("tok"));
        assert_eq!(session.navigator().current(), Route::HomeDuenio);
        Ok(())
    }

    #[test]
    fn init_with_token_only_is_anonymous() {
        let store = MemoryStore::with_entries([(TOKEN_KEY, "tok")]);
        let session = Session::init(Box::new(store));

        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert_eq!(session.navigator().current(), Route::Landing);
    }

    #[test]
    fn init_clears_unreadable_user() -> Result<(), Box<dyn std::error::Error>> {
        let store = std::sync::Arc::new(MemoryStore::with_entries([
            (TOKEN_KEY, "tok"),
            (USER_KEY, "{broken"),
        ]));
        let session = Session::init(Box::new(store.clone()));

        assert!(!session.is_authenticated());
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn login_then_logout_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let store = std::sync::Arc::new(MemoryStore::new());
        let session = Session::init(Box::new(store.clone()));

        let landing = session.login(owner(), "tok".to_string())?;
        assert_eq!(landing, Route::HomeDuenio);
        assert_eq!(store.get(TOKEN_KEY)?.as_deref(), Some("tok"));

        session.logout()?;
        assert!(!session.is_authenticated());
        assert!(store.is_empty());
        assert_eq!(session.navigator().current(), Route::Login);
        Ok(())
    }

    #[test]
    fn expire_only_clears_the_rejected_token() -> Result<(), Box<dyn std::error::Error>> {
        let store = std::sync::Arc::new(MemoryStore::new());
        let session = Session::init(Box::new(store.clone()));
        session.login(owner(), "old".to_string())?;
        session.login(owner(), "new".to_string())?;

        assert!(!session.expire("old"));
        assert!(session.is_authenticated());
        assert_eq!(store.get(TOKEN_KEY)?.as_deref(), Some("new"));
        assert_eq!(session.navigator().current(), Route::HomeDuenio);

        assert!(session.expire("new"));
        assert!(!session.is_authenticated());
        assert!(store.is_empty());
        assert_eq!(session.navigator().current(), Route::Login);
        Ok(())
    }

    #[test]
    fn update_user_merges_and_keeps_token() -> Result<(), Box<dyn std::error::Error>> {
        let store = std::sync::Arc::new(MemoryStore::new());
        let session = Session::init(Box::new(store.clone()));
        session.login(owner(), "tok".to_string())?;

        let updated = session.update_user(UserPatch {
            nombre: Some("Olga M.".to_string()),
            email: Some("  ".to_string()),
            rol: None,
        })?;

        assert_eq!(updated.nombre, "Olga M.");
        assert_eq!(updated.email, "olga@example.com");
        assert_eq!(session.token().as_deref(), Some("tok"));
        let stored: User = serde_json::from_str(&store.get(USER_KEY)?.unwrap_or_default())?;
        assert_eq!(stored, updated);
        Ok(())
    }

    #[test]
    fn update_user_without_session_fails() {
        let session = Session::init(Box::new(MemoryStore::new()));
        let result = session.update_user(UserPatch::default());
        assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    }
}
