use crate::catalog_store::CatalogError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a scan without a result.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("music root {path:?} cannot be read: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog snapshot unavailable: {0}")]
    SnapshotUnavailable(#[source] CatalogError),

    #[error("scan cancelled")]
    Cancelled,

    #[error("a scan of {0:?} is already in progress")]
    AlreadyRunning(PathBuf),
}

impl ScanError {
    /// Root unreadable or snapshot unavailable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::RootUnreadable { .. } | ScanError::SnapshotUnavailable(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum TagError {
    #[error("unreadable tags: {0}")]
    Unreadable(#[from] lofty::error::LoftyError),

    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("invalid artwork: {0}")]
    InvalidImage(#[source] image::ImageError),

    #[error("could not encode artwork: {0}")]
    Encode(#[source] image::ImageError),

    #[error("could not store artwork: {0}")]
    Io(#[from] std::io::Error),
}

/// A problem with a single file. Recorded in the scan result; the scan goes on.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Error opening file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading tags from {path}: {source}")]
    UnreadableTags {
        path: String,
        #[source]
        source: TagError,
    },

    #[error("Error decoding album art for {path}: {source}")]
    InvalidArtwork {
        path: String,
        #[source]
        source: ArtworkError,
    },

    #[error("Error saving {path} to the catalog: {source}")]
    Catalog {
        path: String,
        #[source]
        source: CatalogError,
    },

    #[error("Error deleting {path} from the catalog: {source}")]
    Delete {
        path: String,
        #[source]
        source: CatalogError,
    },

    #[error("Error accessing path: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Skipping {0}: path is not valid UTF-8")]
    InvalidPath(String),
}

/// Failures of the path resolution operations.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("path {0:?} escapes the configured root")]
    PathTraversal(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Catalog(CatalogError),

    #[error("could not resolve path: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CatalogError> for ResolveError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => ResolveError::NotFound(id),
            other => ResolveError::Catalog(other),
        }
    }
}
