pub mod auth;
mod sqlite_user_store;
mod user_manager;
mod user_models;
mod user_store;

pub use auth::{
    AuthToken, AuthTokenValue, CredentialHasher, HashedPassword, UsernamePasswordCredentials,
};
pub use sqlite_user_store::SqliteUserStore;
pub use user_manager::{UserError, UserManager};
pub use user_models::User;
pub use user_store::{UserAuthTokenStore, UserCredentialsStore, UserStore};
