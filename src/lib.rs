//! Musicbox Server Library
//!
//! Keeps a SQLite catalog in sync with a directory of audio files and serves
//! it over HTTP. The modules are exposed for the binary and for testing.

pub mod background_jobs;
pub mod catalog_store;
pub mod config;
pub mod library;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use library::LibraryService;
pub use server::{make_app, run_server, RequestsLoggingLevel};
pub use user::{SqliteUserStore, UserManager};
