use crate::library::LibraryService;
use crate::user::UserManager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    pub library: Arc<LibraryService>,

    pub user_manager: Arc<UserManager>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        library: Arc<LibraryService>,
        user_manager: Arc<UserManager>,
    ) -> Self {
        Self {
            cancellation_token,
            library,
            user_manager,
        }
    }

    /// Same resources, different cancellation token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            library: Arc::clone(&self.library),
            user_manager: Arc::clone(&self.user_manager),
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
