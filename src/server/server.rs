use anyhow::Result;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::catalog_store::CatalogEntry;
use crate::library::{log_scan_outcome, ResolveError, ScanError};
use crate::user::{auth::AuthTokenValue, User, UserError};
use axum_extra::extract::cookie::{Cookie, SameSite};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, response, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::session::{AdminSession, Session, COOKIE_SESSION_TOKEN_KEY};
use super::stream_track::{content_type_for, serve_file, ByteRange};
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub version: &'static str,
    pub git_hash: String,
    pub uptime_secs: u64,
    pub uptime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize)]
struct CredentialsBody {
    pub handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Serialize)]
struct SongResponse {
    id: String,
    title: String,
    artist: String,
    album: String,
    track_number: u32,
    genre: String,
    year: u32,
    duration_seconds: u32,
    filename: String,
    created_at: String,
    updated_at: String,
    audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    album_art_url: Option<String>,
}

fn rfc3339(unix_seconds: i64) -> String {
    chrono::DateTime::from_timestamp(unix_seconds, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_default()
}

impl From<CatalogEntry> for SongResponse {
    fn from(entry: CatalogEntry) -> Self {
        let album_art_url = entry
            .metadata
            .artwork_path
            .as_ref()
            .map(|_| format!("/v1/library/artwork/{}", entry.id));
        SongResponse {
            audio_url: format!("/v1/library/audio/{}", entry.id),
            album_art_url,
            created_at: rfc3339(entry.created_at),
            updated_at: rfc3339(entry.updated_at),
            id: entry.id,
            title: entry.metadata.title,
            artist: entry.metadata.artist,
            album: entry.metadata.album,
            track_number: entry.metadata.track_number,
            genre: entry.metadata.genre,
            year: entry.metadata.year,
            duration_seconds: entry.metadata.duration_seconds,
            filename: entry.filename,
        }
    }
}

#[derive(Serialize)]
struct LibraryResponse {
    songs: Vec<SongResponse>,
    total: usize,
}

#[derive(Serialize)]
struct CleanupSessionsResponse {
    removed: usize,
}

fn resolve_error_response(err: ResolveError) -> Response {
    match err {
        ResolveError::PathTraversal(ref path) => {
            debug!("Rejected path {:?}", path);
            (StatusCode::BAD_REQUEST, err_body(&err)).into_response()
        }
        ResolveError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        other => {
            error!("Could not resolve path: {}", other);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn user_error_response(err: UserError) -> Response {
    match err {
        UserError::EmptyHandle | UserError::EmptyPassword => {
            (StatusCode::BAD_REQUEST, err_body(&err)).into_response()
        }
        UserError::HandleTaken(_) => (StatusCode::CONFLICT, err_body(&err)).into_response(),
        UserError::InvalidCredentials => StatusCode::UNAUTHORIZED.into_response(),
        UserError::Storage(e) => {
            error!("User storage failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn err_body(err: &impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": err.to_string() }))
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed();
    Json(ServerStats {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: state.hash.clone(),
        uptime_secs: uptime.as_secs(),
        uptime: format_uptime(uptime),
        user_handle: session.map(|s| s.handle),
    })
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    match user_manager.register(&body.handle, &body.password) {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(err) => user_error_response(err),
    }
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<CredentialsBody>,
) -> Response {
    debug!("login() called for {}", body.handle);
    let auth_token = match user_manager.login(&body.handle, &body.password) {
        Ok(auth_token) => auth_token,
        Err(err) => return user_error_response(err),
    };

    let response_body = LoginSuccessResponse {
        token: auth_token.value.0.clone(),
    };
    let cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, auth_token.value.0))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    (
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(response_body),
    )
        .into_response()
}

async fn logout(State(user_manager): State<GuardedUserManager>, session: Session) -> Response {
    match user_manager.logout(&AuthTokenValue(session.token)) {
        Ok(_) => {
            let mut cookie = Cookie::build((COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                .same_site(SameSite::Lax)
                .build();
            cookie.make_removal();

            response::Builder::new()
                .status(StatusCode::OK)
                .header(header::SET_COOKIE, cookie.to_string())
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) => user_error_response(err),
    }
}

async fn get_me(session: Session) -> Json<User> {
    Json(User {
        id: session.user_id,
        handle: session.handle,
        is_admin: session.is_admin,
    })
}

async fn list_library(_session: Session, State(library): State<GuardedLibrary>) -> Response {
    match library.list_entries() {
        Ok(entries) => {
            let songs: Vec<SongResponse> = entries.into_iter().map(SongResponse::from).collect();
            Json(LibraryResponse {
                total: songs.len(),
                songs,
            })
            .into_response()
        }
        Err(err) => {
            error!("Could not list the library: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_audio(
    _session: Session,
    byte_range: Option<ByteRange>,
    State(library): State<GuardedLibrary>,
    Path(path): Path<String>,
) -> Response {
    let file_path = match library.resolve_audio_path(&path) {
        Ok(p) => p,
        Err(err) => return resolve_error_response(err),
    };
    debug!("Streaming audio from {}", file_path.display());
    let content_type = content_type_for(&file_path);
    serve_file(&file_path, byte_range, &content_type).await
}

async fn get_artwork(
    _session: Session,
    State(library): State<GuardedLibrary>,
    Path(path): Path<String>,
) -> Response {
    match library.resolve_artwork_path(&path) {
        Ok(file_path) => serve_file(&file_path, None, "image/jpeg").await,
        Err(err) => resolve_error_response(err),
    }
}

async fn post_scan(AdminSession(session): AdminSession, State(state): State<ServerState>) -> Response {
    info!("Scan requested by {}", session.handle);
    let library = state.library.clone();
    let token = state.shutdown_token.child_token();
    let outcome = match tokio::task::spawn_blocking(move || library.trigger_scan(&token)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Scan task failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    log_scan_outcome("HTTP", &outcome);

    match outcome {
        Ok(result) => Json(result).into_response(),
        Err(err @ ScanError::AlreadyRunning(_)) => {
            (StatusCode::CONFLICT, err_body(&err)).into_response()
        }
        Err(err @ ScanError::Cancelled) => {
            (StatusCode::SERVICE_UNAVAILABLE, err_body(&err)).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err_body(&err)).into_response(),
    }
}

async fn post_cleanup_sessions(
    _session: AdminSession,
    State(user_manager): State<GuardedUserManager>,
) -> Response {
    match user_manager.prune_expired_sessions() {
        Ok(removed) => Json(CleanupSessionsResponse { removed }).into_response(),
        Err(err) => user_error_response(err),
    }
}

pub fn make_app(
    config: ServerConfig,
    library: GuardedLibrary,
    user_manager: GuardedUserManager,
    shutdown_token: CancellationToken,
) -> Result<Router> {
    let state = ServerState::new(config.clone(), library, user_manager, shutdown_token);

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .with_state(state.clone());

    let user_routes: Router = Router::new()
        .route("/me", get(get_me))
        .with_state(state.clone());

    let library_routes: Router = Router::new()
        .route("/", get(list_library))
        .route("/audio/{*path}", get(get_audio))
        .route("/artwork/{*path}", get(get_artwork))
        .with_state(state.clone());

    let admin_routes: Router = Router::new()
        .route("/scan", post(post_scan))
        .route("/cleanup-sessions", post(post_cleanup_sessions))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/user", user_routes)
        .nest("/v1/library", library_routes)
        .nest("/v1/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

/// Serves the API until `shutdown_token` is cancelled.
pub async fn run_server(
    config: ServerConfig,
    library: GuardedLibrary,
    user_manager: GuardedUserManager,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, library, user_manager, shutdown_token.clone())?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await?;
    Ok(())
}
