//! In-memory catalog repository for tests and ephemeral setups.

use super::models::CatalogEntry;
use super::trait_def::{ensure_active, ensure_valid, CatalogError, CatalogRepository};
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Keeps entries in a map keyed by id, with the same uniqueness rules as
/// the SQLite store.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    entries: Mutex<BTreeMap<String, CatalogEntry>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, CatalogEntry>>, CatalogError> {
        self.entries
            .lock()
            .map_err(|_| CatalogError::Storage(anyhow!("in-memory catalog lock poisoned")))
    }
}

fn path_taken_by_other(
    entries: &BTreeMap<String, CatalogEntry>,
    entry: &CatalogEntry,
) -> bool {
    entries
        .values()
        .any(|e| e.relative_path == entry.relative_path && e.id != entry.id)
}

impl CatalogRepository for InMemoryCatalogStore {
    fn list_all(&self, ctx: &CancellationToken) -> Result<Vec<CatalogEntry>, CatalogError> {
        ensure_active(ctx)?;
        let mut all: Vec<CatalogEntry> = self.lock()?.values().cloned().collect();
        all.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(all)
    }

    fn get(&self, ctx: &CancellationToken, id: &str) -> Result<CatalogEntry, CatalogError> {
        ensure_active(ctx)?;
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    fn create(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError> {
        ensure_active(ctx)?;
        ensure_valid(entry)?;
        let mut entries = self.lock()?;
        if entries.contains_key(&entry.id) || path_taken_by_other(&entries, entry) {
            return Err(CatalogError::DuplicatePath(entry.relative_path.clone()));
        }
        entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn update(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError> {
        ensure_active(ctx)?;
        ensure_valid(entry)?;
        let mut entries = self.lock()?;
        if !entries.contains_key(&entry.id) {
            return Err(CatalogError::NotFound(entry.id.clone()));
        }
        if path_taken_by_other(&entries, entry) {
            return Err(CatalogError::DuplicatePath(entry.relative_path.clone()));
        }
        entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn delete(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError> {
        ensure_active(ctx)?;
        self.lock()?
            .remove(&entry.id)
            .map(|_| ())
            .ok_or_else(|| CatalogError::NotFound(entry.id.clone()))
    }
}
