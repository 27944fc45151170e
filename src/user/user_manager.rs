use super::auth::{AuthToken, AuthTokenValue, HashedPassword};
use super::user_models::User;
use super::user_store::UserStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("The user handle cannot be empty.")]
    EmptyHandle,

    #[error("The password cannot be empty.")]
    EmptyPassword,

    #[error("User handle {0} already exists.")]
    HandleTaken(String),

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct UserManager {
    user_store: Arc<dyn UserStore>,
    session_ttl: Duration,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>, session_ttl: Duration) -> Self {
        Self {
            user_store,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Creates a user with password credentials. The first registered user
    /// becomes an admin.
    pub fn register(&self, user_handle: &str, password: &str) -> Result<User, UserError> {
        let user_handle = user_handle.trim();
        if user_handle.is_empty() {
            return Err(UserError::EmptyHandle);
        }
        if password.is_empty() {
            return Err(UserError::EmptyPassword);
        }

        let password = HashedPassword::new(password)?;
        let user = self
            .user_store
            .create_user(user_handle, &password)?
            .ok_or_else(|| UserError::HandleTaken(user_handle.to_string()))?;
        info!(
            "Registered user {} (id {}, admin: {})",
            user.handle, user.id, user.is_admin
        );
        Ok(user)
    }

    /// Checks the password and opens a new session.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<AuthToken, UserError> {
        let user_id = self
            .user_store
            .get_user_id(user_handle.trim())?
            .ok_or(UserError::InvalidCredentials)?;
        let credentials = self
            .user_store
            .get_password_credentials(user_id)?
            .ok_or(UserError::InvalidCredentials)?;
        if !credentials.matches(password)? {
            debug!("Wrong password for user {}", user_id);
            return Err(UserError::InvalidCredentials);
        }

        let token = AuthToken {
            user_id,
            created: SystemTime::now(),
            last_used: None,
            value: AuthTokenValue::generate(),
        };
        self.user_store.add_user_auth_token(&token)?;
        Ok(token)
    }

    /// Returns whether a session was closed.
    pub fn logout(&self, token: &AuthTokenValue) -> Result<bool, UserError> {
        Ok(self.user_store.delete_user_auth_token(token)?.is_some())
    }

    /// The user owning a live session token, refreshing its last use.
    ///
    /// A token idle for longer than the session ttl is deleted and treated
    /// as unknown.
    pub fn authenticate(&self, token: &AuthTokenValue) -> Result<Option<User>, UserError> {
        let auth_token = match self.user_store.get_user_auth_token(token)? {
            Some(auth_token) => auth_token,
            None => return Ok(None),
        };

        let now = SystemTime::now();
        let idle = now
            .duration_since(auth_token.last_activity())
            .unwrap_or_default();
        if idle > self.session_ttl {
            debug!("Session of user {} expired", auth_token.user_id);
            self.user_store.delete_user_auth_token(token)?;
            return Ok(None);
        }

        self.user_store
            .update_user_auth_token_last_used_timestamp(token, now)?;
        Ok(self.user_store.get_user(auth_token.user_id)?)
    }

    /// Deletes every session idle for longer than the session ttl.
    pub fn prune_expired_sessions(&self) -> Result<usize, UserError> {
        let cutoff = SystemTime::now()
            .checked_sub(self.session_ttl)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let removed = self.user_store.prune_auth_tokens_unused_since(cutoff)?;
        if removed > 0 {
            info!("Removed {} expired sessions", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{SqliteUserStore, UserAuthTokenStore, UserCredentialsStore};
    use tempfile::TempDir;

    fn create_tmp_manager(session_ttl: Duration) -> (UserManager, Arc<SqliteUserStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteUserStore::new(temp_dir.path().join("user.db")).unwrap());
        let manager = UserManager::new(store.clone(), session_ttl);
        (manager, store, temp_dir)
    }

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn first_registered_user_is_admin() {
        let (manager, _, _temp_dir) = create_tmp_manager(DAY);

        assert!(manager.register("alice", "pw").unwrap().is_admin);
        assert!(!manager.register("bob", "pw").unwrap().is_admin);
    }

    #[test]
    fn rejects_invalid_registrations() {
        let (manager, _, _temp_dir) = create_tmp_manager(DAY);
        manager.register("alice", "pw").unwrap();

        assert!(matches!(
            manager.register("  ", "pw"),
            Err(UserError::EmptyHandle)
        ));
        assert!(matches!(
            manager.register("carol", ""),
            Err(UserError::EmptyPassword)
        ));
        assert!(matches!(
            manager.register("alice", "other"),
            Err(UserError::HandleTaken(_))
        ));
    }

    #[test]
    fn concurrent_duplicate_registrations_yield_one_user() {
        let (manager, store, _temp_dir) = create_tmp_manager(DAY);

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let manager = &manager;
                    scope.spawn(move || manager.register("dup", &format!("pw{}", i)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(UserError::HandleTaken(_)))));

        let user_id = store.get_user_id("dup").unwrap().unwrap();
        assert!(store.get_password_credentials(user_id).unwrap().is_some());
    }

    #[test]
    fn login_authenticate_logout() {
        let (manager, _, _temp_dir) = create_tmp_manager(DAY);
        let alice = manager.register("alice", "secret").unwrap();

        assert!(matches!(
            manager.login("alice", "wrong"),
            Err(UserError::InvalidCredentials)
        ));
        assert!(matches!(
            manager.login("nobody", "secret"),
            Err(UserError::InvalidCredentials)
        ));

        let token = manager.login("alice", "secret").unwrap();
        assert_eq!(manager.authenticate(&token.value).unwrap(), Some(alice));

        assert!(manager.logout(&token.value).unwrap());
        assert!(!manager.logout(&token.value).unwrap());
        assert_eq!(manager.authenticate(&token.value).unwrap(), None);
    }

    #[test]
    fn idle_sessions_expire() {
        let (manager, store, _temp_dir) = create_tmp_manager(DAY);
        let alice = manager.register("alice", "secret").unwrap();

        let stale = AuthToken {
            user_id: alice.id,
            created: SystemTime::now() - 3 * DAY,
            last_used: None,
            value: AuthTokenValue::generate(),
        };
        store.add_user_auth_token(&stale).unwrap();
        assert_eq!(manager.authenticate(&stale.value).unwrap(), None);
        assert!(store.get_user_auth_token(&stale.value).unwrap().is_none());
    }

    #[test]
    fn prunes_only_expired_sessions() {
        let (manager, store, _temp_dir) = create_tmp_manager(DAY);
        let alice = manager.register("alice", "secret").unwrap();
        let live = manager.login("alice", "secret").unwrap();
        store
            .add_user_auth_token(&AuthToken {
                user_id: alice.id,
                created: SystemTime::now() - 2 * DAY,
                last_used: None,
                value: AuthTokenValue::generate(),
            })
            .unwrap();

        assert_eq!(manager.prune_expired_sessions().unwrap(), 1);
        assert!(manager.authenticate(&live.value).unwrap().is_some());
    }
}
