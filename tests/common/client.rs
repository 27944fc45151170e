//! HTTP client for integration tests
//!
//! This module wraps reqwest and provides one method per server endpoint.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for testing authentication flows.
    /// For most tests, use `authenticated()` or `authenticated_admin()` instead.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client pre-authenticated as the regular test user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client pre-authenticated as the admin user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::authenticated_as(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    async fn authenticated_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            handle,
            response.text().await
        );

        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/register
    pub async fn register(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(self.url("/v1/auth/register"))
            .json(&json!({ "handle": handle, "password": password }))
            .send()
            .await
            .expect("Register request failed")
    }

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(self.url("/v1/auth/login"))
            .json(&json!({ "handle": handle, "password": password }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// POST /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .post(self.url("/v1/auth/logout"))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// GET /v1/user/me
    pub async fn me(&self) -> Response {
        self.client
            .get(self.url("/v1/user/me"))
            .send()
            .await
            .expect("Me request failed")
    }

    // ========================================================================
    // Library Endpoints
    // ========================================================================

    /// GET /v1/library
    pub async fn library(&self) -> Response {
        self.client
            .get(self.url("/v1/library"))
            .send()
            .await
            .expect("Library request failed")
    }

    /// GET /v1/library/audio/{path or id}
    pub async fn audio(&self, path_or_id: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/library/audio/{}", path_or_id)))
            .send()
            .await
            .expect("Audio request failed")
    }

    /// GET /v1/library/audio/{path or id} with a Range header
    pub async fn audio_range(&self, path_or_id: &str, range: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/library/audio/{}", path_or_id)))
            .header("Range", range)
            .send()
            .await
            .expect("Audio range request failed")
    }

    /// GET /v1/library/artwork/{path or id}
    pub async fn artwork(&self, path_or_id: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/library/artwork/{}", path_or_id)))
            .send()
            .await
            .expect("Artwork request failed")
    }

    // ========================================================================
    // Admin Endpoints
    // ========================================================================

    /// POST /v1/admin/scan
    pub async fn scan(&self) -> Response {
        self.client
            .post(self.url("/v1/admin/scan"))
            .send()
            .await
            .expect("Scan request failed")
    }

    /// POST /v1/admin/cleanup-sessions
    pub async fn cleanup_sessions(&self) -> Response {
        self.client
            .post(self.url("/v1/admin/cleanup-sessions"))
            .send()
            .await
            .expect("Cleanup sessions request failed")
    }

    // ========================================================================
    // Server Info
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(self.url("/"))
            .send()
            .await
            .expect("Home request failed")
    }
}
