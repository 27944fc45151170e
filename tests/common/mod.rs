//! Common test infrastructure
//!
//! This module provides the fixtures, servers and clients shared by the
//! integration tests. Tests should only import from this module, not from
//! internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FlacBuilder, TestServer, TestClient};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_scan() {
//!     let server = TestServer::spawn().await;
//!     FlacBuilder::new().title("Song").write_to(&server.music_dir().join("song.flac"));
//!     let client = TestClient::authenticated_admin(server.base_url.clone()).await;
//!
//!     let response = client.scan().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

#![allow(dead_code)]

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use fixtures::{png_bytes, FlacBuilder, LibraryDirs};
pub use server::TestServer;
