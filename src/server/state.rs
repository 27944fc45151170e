use axum::extract::FromRef;

use crate::library::LibraryService;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::ServerConfig;

pub type GuardedLibrary = Arc<LibraryService>;
pub type GuardedUserManager = Arc<UserManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub library: GuardedLibrary,
    pub user_manager: GuardedUserManager,
    /// Cancelled when the server shuts down; scans started over HTTP listen to it.
    pub shutdown_token: CancellationToken,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        library: GuardedLibrary,
        user_manager: GuardedUserManager,
        shutdown_token: CancellationToken,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            library,
            user_manager,
            shutdown_token,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

impl FromRef<ServerState> for GuardedLibrary {
    fn from_ref(input: &ServerState) -> Self {
        input.library.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
