use super::artwork::ArtworkStore;
use super::error::{ResolveError, ScanError};
use super::path_guard::PathGuard;
use super::scanner::{ScanResult, Scanner};
use crate::catalog_store::{CatalogEntry, CatalogError, CatalogRepository};
use crate::config::LibraryConfig;
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

lazy_static! {
    /// Canonical music roots with a scan in flight, across all services.
    static ref SCANS_IN_FLIGHT: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Held while a scan of `root` runs; released on drop.
pub(crate) struct ScanGuard {
    root: PathBuf,
}

impl ScanGuard {
    pub(crate) fn acquire(root: &Path) -> Result<Self, ScanError> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut in_flight = SCANS_IN_FLIGHT
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(root.clone()) {
            return Err(ScanError::AlreadyRunning(root));
        }
        Ok(Self { root })
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        SCANS_IN_FLIGHT
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.root);
    }
}

/// Entry point of the library engine for the HTTP layer and background jobs.
pub struct LibraryService {
    scanner: Scanner,
    repository: Arc<dyn CatalogRepository>,
    music_guard: PathGuard,
    artwork_guard: PathGuard,
}

impl LibraryService {
    pub fn new(
        config: &LibraryConfig,
        repository: Arc<dyn CatalogRepository>,
    ) -> std::io::Result<Self> {
        let music_guard = PathGuard::new(&config.music_root)?;
        let artwork_guard = PathGuard::new(&config.artwork_root)?;
        let scanner = Scanner::new(
            music_guard.root(),
            ArtworkStore::new(artwork_guard.root()),
            repository.clone(),
        );
        Ok(Self {
            scanner,
            repository,
            music_guard,
            artwork_guard,
        })
    }

    pub fn music_root(&self) -> &Path {
        self.music_guard.root()
    }

    /// Synchronizes the catalog with the music root.
    ///
    /// Blocking; async callers should run it with `spawn_blocking`. Fails
    /// with [`ScanError::AlreadyRunning`] while another scan of the same root
    /// is in progress.
    pub fn trigger_scan(&self, ctx: &CancellationToken) -> Result<ScanResult, ScanError> {
        let _guard = ScanGuard::acquire(self.music_root())?;
        self.scanner.scan(ctx)
    }

    pub fn list_entries(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.repository.list_all(&CancellationToken::new())
    }

    /// Absolute path of an audio file, given its catalog id or its path
    /// relative to the music root.
    pub fn resolve_audio_path(&self, relative_or_id: &str) -> Result<PathBuf, ResolveError> {
        let relative_path = match self.entry_by_id(relative_or_id)? {
            Some(entry) => entry.relative_path,
            None => relative_or_id.to_string(),
        };
        let path = self.music_guard.resolve(&relative_path)?;
        if !path.is_file() {
            return Err(ResolveError::NotFound(relative_or_id.to_string()));
        }
        Ok(path)
    }

    /// Absolute path of a stored artwork image, given the id of a catalog
    /// entry carrying it or its path relative to the artwork root.
    pub fn resolve_artwork_path(&self, relative_or_id: &str) -> Result<PathBuf, ResolveError> {
        let relative_path = match self.entry_by_id(relative_or_id)? {
            Some(entry) => entry
                .metadata
                .artwork_path
                .ok_or_else(|| ResolveError::NotFound(relative_or_id.to_string()))?,
            None => relative_or_id.to_string(),
        };
        let path = self.artwork_guard.resolve(&relative_path)?;
        if !path.is_file() {
            return Err(ResolveError::NotFound(relative_or_id.to_string()));
        }
        Ok(path)
    }

    fn entry_by_id(&self, relative_or_id: &str) -> Result<Option<CatalogEntry>, ResolveError> {
        if Uuid::parse_str(relative_or_id).is_err() {
            return Ok(None);
        }
        debug!("Resolving catalog id {}", relative_or_id);
        let entry = self
            .repository
            .get(&CancellationToken::new(), relative_or_id)?;
        Ok(Some(entry))
    }
}

impl std::fmt::Debug for LibraryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryService")
            .field("music_root", &self.music_guard.root())
            .field("artwork_root", &self.artwork_guard.root())
            .finish()
    }
}

/// Logs the outcome of a scan started by `trigger`.
pub fn log_scan_outcome(trigger: &str, outcome: &Result<ScanResult, ScanError>) {
    match outcome {
        Ok(result) => info!(
            "{} scan completed: {} added, {} updated, {} removed, {} errors",
            trigger,
            result.added,
            result.updated,
            result.removed,
            result.errors.len()
        ),
        Err(err) => info!("{} scan did not complete: {}", trigger, err),
    }
}
