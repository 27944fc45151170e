//! CatalogRepository trait definition.

use super::models::CatalogEntry;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog entry {0} not found")]
    NotFound(String),

    #[error("catalog entries must have a non-empty relative path")]
    EmptyPath,

    #[error("a catalog entry for {0} already exists")]
    DuplicatePath(String),

    #[error("catalog operation cancelled")]
    Cancelled,

    #[error("catalog storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Storage(err.into())
    }
}

/// Persistence for catalog entries, keyed by unique relative path.
///
/// Every operation takes the caller's cancellation token and fails with
/// [`CatalogError::Cancelled`] once it has fired.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait CatalogRepository: Send + Sync {
    /// Returns every persisted entry.
    fn list_all(&self, ctx: &CancellationToken) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Looks up one entry by id.
    fn get(&self, ctx: &CancellationToken, id: &str) -> Result<CatalogEntry, CatalogError>;

    /// Persists a new entry. Fails with `DuplicatePath` if its relative path
    /// is already cataloged.
    fn create(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError>;

    /// Overwrites the entry with the same id.
    fn update(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError>;

    /// Removes the entry with the same id.
    fn delete(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError>;
}

pub(crate) fn ensure_active(ctx: &CancellationToken) -> Result<(), CatalogError> {
    if ctx.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }
    Ok(())
}

pub(crate) fn ensure_valid(entry: &CatalogEntry) -> Result<(), CatalogError> {
    if entry.relative_path.is_empty() {
        return Err(CatalogError::EmptyPath);
    }
    Ok(())
}
