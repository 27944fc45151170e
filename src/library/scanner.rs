//! Library scanning and reconciliation.
//!
//! A scan loads the whole catalog, walks the music root, and brings the
//! catalog in line with what is on disk:
//!
//! - a supported file whose metadata matches its entry is left untouched;
//! - a supported file whose metadata changed updates its entry in place;
//! - a supported file without an entry gets a new one;
//! - an entry whose file was not seen during the walk is deleted.
//!
//! Problems with single files are collected in [`ScanResult::errors`] and
//! never abort the scan. A file that fails keeps whatever entry it had.

use super::artwork::ArtworkStore;
use super::error::{FileError, ScanError};
use super::tags::{self, TrackTags};
use crate::catalog_store::{CatalogEntry, CatalogError, CatalogRepository, TrackMetadata};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub errors: Vec<String>,
}

impl ScanResult {
    fn record(&mut self, error: FileError) {
        warn!("{}", error);
        self.errors.push(error.to_string());
    }
}

/// Metadata read for one file, plus an artwork problem that did not stop
/// the file from being cataloged.
struct Candidate {
    metadata: TrackMetadata,
    artwork_error: Option<FileError>,
}

/// Catalog entries by relative path, split into those not yet matched by
/// the walk and those already reconciled during it.
#[derive(Default)]
struct Reconciliation {
    unseen: BTreeMap<String, CatalogEntry>,
    seen: BTreeMap<String, CatalogEntry>,
}

impl Reconciliation {
    fn from_snapshot(entries: Vec<CatalogEntry>) -> Self {
        Self {
            unseen: entries
                .into_iter()
                .map(|e| (e.relative_path.clone(), e))
                .collect(),
            seen: BTreeMap::new(),
        }
    }

    /// The entry currently cataloged at `relative_path`, marked as seen.
    ///
    /// A path reconciled earlier in the same scan returns what that earlier
    /// file left behind, so the file processed last wins.
    fn take(&mut self, relative_path: &str) -> Option<CatalogEntry> {
        self.unseen
            .remove(relative_path)
            .or_else(|| self.seen.remove(relative_path))
    }

    fn keep(&mut self, relative_path: &str) {
        if let Some(entry) = self.unseen.remove(relative_path) {
            self.seen.insert(relative_path.to_string(), entry);
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Root-relative, `/`-separated form of `path`, or `None` if `path` is not
/// under `root` or is not valid UTF-8.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

pub struct Scanner {
    music_root: PathBuf,
    artwork: ArtworkStore,
    repository: Arc<dyn CatalogRepository>,
}

impl Scanner {
    pub fn new(
        music_root: impl Into<PathBuf>,
        artwork: ArtworkStore,
        repository: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            music_root: music_root.into(),
            artwork,
            repository,
        }
    }

    pub fn music_root(&self) -> &Path {
        &self.music_root
    }

    pub fn scan(&self, ctx: &CancellationToken) -> Result<ScanResult, ScanError> {
        info!("Scanning music library at {:?}", self.music_root);

        let snapshot = self.repository.list_all(ctx).map_err(|err| match err {
            CatalogError::Cancelled => ScanError::Cancelled,
            other => ScanError::SnapshotUnavailable(other),
        })?;
        debug!("Loaded {} catalog entries", snapshot.len());
        let mut state = Reconciliation::from_snapshot(snapshot);

        fs::read_dir(&self.music_root).map_err(|source| ScanError::RootUnreadable {
            path: self.music_root.clone(),
            source,
        })?;

        let mut result = ScanResult::default();
        for entry in WalkDir::new(&self.music_root).sort_by_file_name() {
            if ctx.is_cancelled() {
                info!("Scan of {:?} cancelled", self.music_root);
                return Err(ScanError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk failed at root"));
                    return Err(ScanError::RootUnreadable {
                        path: self.music_root.clone(),
                        source,
                    });
                }
                Err(err) => {
                    result.record(FileError::Walk(err));
                    continue;
                }
            };

            // Symlinks are not followed, so they never reach outside the root.
            if !entry.file_type().is_file() || !is_supported(entry.path()) {
                continue;
            }

            let relative_path = match relative_key(&self.music_root, entry.path()) {
                Some(relative_path) => relative_path,
                None => {
                    result.record(FileError::InvalidPath(
                        entry.path().to_string_lossy().into_owned(),
                    ));
                    continue;
                }
            };

            match self.read_candidate(entry.path(), &relative_path) {
                Ok(candidate) => {
                    self.reconcile(ctx, &relative_path, candidate.metadata, &mut state, &mut result)?;
                    if let Some(error) = candidate.artwork_error {
                        result.record(error);
                    }
                }
                Err(error) => {
                    state.keep(&relative_path);
                    result.record(error);
                }
            }
        }

        for (relative_path, entry) in std::mem::take(&mut state.unseen) {
            if ctx.is_cancelled() {
                info!("Scan of {:?} cancelled", self.music_root);
                return Err(ScanError::Cancelled);
            }
            match self.repository.delete(ctx, &entry) {
                Ok(()) => {
                    debug!("Removed {} from the catalog", relative_path);
                    result.removed += 1;
                }
                Err(CatalogError::Cancelled) => return Err(ScanError::Cancelled),
                Err(CatalogError::NotFound(_)) => {
                    debug!("{} was already gone from the catalog", relative_path);
                }
                Err(source) => result.record(FileError::Delete {
                    path: relative_path,
                    source,
                }),
            }
        }

        info!(
            "Scan finished: {} added, {} updated, {} removed, {} errors",
            result.added,
            result.updated,
            result.removed,
            result.errors.len()
        );
        Ok(result)
    }

    fn read_candidate(&self, path: &Path, relative_path: &str) -> Result<Candidate, FileError> {
        let tags = {
            let file = File::open(path).map_err(|source| FileError::Open {
                path: relative_path.to_string(),
                source,
            })?;
            tags::extract(BufReader::new(file)).map_err(|source| FileError::UnreadableTags {
                path: relative_path.to_string(),
                source,
            })?
        };

        let TrackTags {
            title,
            artist,
            album,
            genre,
            year,
            track_number,
            duration_seconds,
            picture,
        } = tags;

        let (artwork_path, artwork_error) = match picture {
            Some(bytes) => match self.artwork.store(&bytes) {
                Ok(stored) => (Some(stored), None),
                Err(source) => (
                    None,
                    Some(FileError::InvalidArtwork {
                        path: relative_path.to_string(),
                        source,
                    }),
                ),
            },
            None => (None, None),
        };

        Ok(Candidate {
            metadata: TrackMetadata {
                title,
                artist,
                album,
                genre,
                year,
                track_number,
                duration_seconds,
                artwork_path,
            },
            artwork_error,
        })
    }

    fn reconcile(
        &self,
        ctx: &CancellationToken,
        relative_path: &str,
        metadata: TrackMetadata,
        state: &mut Reconciliation,
        result: &mut ScanResult,
    ) -> Result<(), ScanError> {
        let outcome = match state.take(relative_path) {
            Some(existing) if existing.metadata == metadata => {
                state.seen.insert(relative_path.to_string(), existing);
                return Ok(());
            }
            Some(existing) => {
                let updated = existing.with_metadata(metadata);
                let outcome = self.repository.update(ctx, &updated);
                if outcome.is_ok() {
                    debug!("Updated {}", relative_path);
                    result.updated += 1;
                    state.seen.insert(relative_path.to_string(), updated);
                } else {
                    state.seen.insert(relative_path.to_string(), existing);
                }
                outcome
            }
            None => {
                let created = CatalogEntry::new(relative_path, metadata);
                let outcome = self.repository.create(ctx, &created);
                if outcome.is_ok() {
                    debug!("Added {}", relative_path);
                    result.added += 1;
                    state.seen.insert(relative_path.to_string(), created);
                }
                outcome
            }
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(CatalogError::Cancelled) => Err(ScanError::Cancelled),
            Err(source) => {
                result.record(FileError::Catalog {
                    path: relative_path.to_string(),
                    source,
                });
                Ok(())
            }
        }
    }
}
