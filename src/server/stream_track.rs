//! File streaming with single byte-range support

use super::state::ServerState;
use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::Path;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

const HEADER_BYTE_RANGE: &str = "Range";
const STREAM_BUFFER_SIZE: usize = 4096 * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref().strip_prefix("bytes=")?;
        let parts: Vec<&str> = v.split('-').collect();
        if parts.len() != 2 {
            return None;
        }

        Some(ByteRange {
            start_inclusive: parts[0].trim().parse::<u64>().ok(),
            end_inclusive: parts[1].trim().parse::<u64>().ok(),
        })
    }

    /// Inclusive `(start, end)` offsets within a file of `file_length`
    /// bytes. `Ok(None)` means the whole file; `Err(())` means the range
    /// cannot be satisfied.
    fn resolve(&self, file_length: u64) -> Result<Option<(u64, u64)>, ()> {
        let last = file_length.checked_sub(1);
        match (self.start_inclusive, self.end_inclusive) {
            (None, None) => Ok(None),
            (Some(start), end) => {
                let last = last.ok_or(())?;
                if start > last {
                    return Err(());
                }
                let end = end.map_or(last, |end| end.min(last));
                if end < start {
                    return Err(());
                }
                Ok(Some((start, end)))
            }
            // bytes=-n is the last n bytes
            (None, Some(suffix)) => {
                let last = last.ok_or(())?;
                if suffix == 0 {
                    return Err(());
                }
                Ok(Some((file_length.saturating_sub(suffix), last)))
            }
        }
    }
}

pub struct ByteRangeExtractionError {}

impl IntoResponse for ByteRangeExtractionError {
    fn into_response(self) -> Response {
        StatusCode::BAD_REQUEST.into_response()
    }
}

impl FromRequestParts<ServerState> for Option<ByteRange> {
    type Rejection = ByteRangeExtractionError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_BYTE_RANGE)
            .and_then(|x| x.to_str().ok())
            .and_then(ByteRange::parse))
    }
}

/// Guesses a content type from the file's magic bytes, then its extension.
pub fn content_type_for(path: &Path) -> String {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return kind.mime_type().to_string();
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn internal_error(path: &Path, err: impl std::fmt::Display) -> Response {
    error!("Could not serve {}: {}", path.display(), err);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Streams `path`, or the part of it selected by `byte_range`.
pub async fn serve_file(path: &Path, byte_range: Option<ByteRange>, content_type: &str) -> Response {
    let mut file = match File::open(path).await {
        Ok(x) => x,
        Err(e) => return internal_error(path, e),
    };
    let file_length = match file.metadata().await {
        Ok(x) => x.len(),
        Err(e) => return internal_error(path, e),
    };

    let range = match byte_range.map(|r| r.resolve(file_length)) {
        None | Some(Ok(None)) => None,
        Some(Ok(Some(range))) => Some(range),
        Some(Err(())) => {
            debug!(
                "Unsatisfiable range {:?} for {} ({} bytes)",
                byte_range,
                path.display(),
                file_length
            );
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", file_length))
                .body(Body::empty())
                .unwrap_or_else(|e| internal_error(path, e));
        }
    };

    let (status_code, start, chunk_size) = match range {
        None => (StatusCode::OK, 0, file_length),
        Some((start, end)) => (StatusCode::PARTIAL_CONTENT, start, end - start + 1),
    };

    if start > 0 {
        if let Err(e) = file.seek(SeekFrom::Start(start)).await {
            return internal_error(path, e);
        }
    }

    let file_reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file).take(chunk_size);
    let stream = ReaderStream::with_capacity(file_reader, STREAM_BUFFER_SIZE);

    let mut builder = Response::builder()
        .status(status_code)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, chunk_size);
    if status_code == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!(
                "bytes {}-{}/{}",
                start,
                start + chunk_size - 1,
                file_length
            ),
        );
    }

    builder
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| internal_error(path, e))
}
