//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own library directories and
//! databases.

use super::constants::*;
use super::fixtures::LibraryDirs;
use musicbox_server::catalog_store::SqliteCatalogStore;
use musicbox_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use musicbox_server::{LibraryService, SqliteUserStore, UserManager};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated library and databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Direct access to the library service, for arranging state in tests
    pub library: Arc<LibraryService>,

    /// Direct access to the user manager, for arranging state in tests
    pub user_manager: Arc<UserManager>,

    // Private fields - keep resources alive until drop
    dirs: LibraryDirs,
    shutdown_token: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// This function:
    /// 1. Creates temporary music, artwork and database directories
    /// 2. Opens SQLite catalog and user databases in them
    /// 3. Registers the admin user first, then a regular user
    /// 4. Binds to a random port (127.0.0.1:0)
    /// 5. Spawns the server in a background task
    /// 6. Waits for the server to be ready
    ///
    /// # Panics
    ///
    /// Panics if any of the steps above fails.
    pub async fn spawn() -> Self {
        Self::spawn_with_session_ttl(Duration::from_secs(3600)).await
    }

    pub async fn spawn_with_session_ttl(session_ttl: Duration) -> Self {
        let dirs = LibraryDirs::new();

        let catalog_store = Arc::new(
            SqliteCatalogStore::new(dirs.db_dir().join("catalog.db"))
                .expect("Failed to open catalog store"),
        );
        let library = Arc::new(
            LibraryService::new(&dirs.library_config(), catalog_store)
                .expect("Failed to create library service"),
        );

        let user_store = Arc::new(
            SqliteUserStore::new(dirs.db_dir().join("user.db")).expect("Failed to open user store"),
        );
        let user_manager = Arc::new(UserManager::new(user_store, session_ttl));
        user_manager
            .register(ADMIN_USER, ADMIN_PASS)
            .expect("Failed to register admin user");
        user_manager
            .register(TEST_USER, TEST_PASS)
            .expect("Failed to register test user");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };

        let shutdown_token = CancellationToken::new();
        let app = make_app(
            config,
            library.clone(),
            user_manager.clone(),
            shutdown_token.clone(),
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        let server_shutdown = shutdown_token.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            library,
            user_manager,
            dirs,
            shutdown_token,
        };

        server.wait_for_ready().await;

        server
    }

    pub fn music_dir(&self) -> PathBuf {
        self.dirs.music_dir()
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.dirs.artwork_dir()
    }

    pub fn dirs(&self) -> &LibraryDirs {
        &self.dirs
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        // TempDir will be cleaned up automatically
    }
}
