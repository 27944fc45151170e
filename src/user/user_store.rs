use super::auth::{AuthToken, AuthTokenValue, HashedPassword, UsernamePasswordCredentials};
use super::user_models::User;
use anyhow::Result;
use std::time::SystemTime;

pub trait UserCredentialsStore: Send + Sync {
    /// Returns Ok(None) if the user has no password.
    fn get_password_credentials(&self, user_id: usize)
        -> Result<Option<UsernamePasswordCredentials>>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns Ok(None) if the token does not exist.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    fn add_user_auth_token(&self, token: &AuthToken) -> Result<()>;

    /// Returns the deleted token, or Ok(None) if it did not exist.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    fn update_user_auth_token_last_used_timestamp(
        &self,
        token: &AuthTokenValue,
        when: SystemTime,
    ) -> Result<()>;

    /// Deletes every token whose last activity is older than `cutoff` and
    /// returns how many were deleted.
    fn prune_auth_tokens_unused_since(&self, cutoff: SystemTime) -> Result<usize>;
}

pub trait UserStore: UserAuthTokenStore + UserCredentialsStore + Send + Sync {
    /// Creates a user together with its password credentials, in one
    /// transaction. The first user ever created is an admin.
    ///
    /// Returns Ok(None) if the handle is already taken.
    fn create_user(&self, user_handle: &str, password: &HashedPassword) -> Result<Option<User>>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: usize) -> Result<Option<User>>;

    /// Returns Ok(None) if no user has this handle.
    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>>;
}
