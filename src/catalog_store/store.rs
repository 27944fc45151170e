//! SQLite-backed catalog repository.

use super::models::{CatalogEntry, TrackMetadata};
use super::schema::{CATALOG_VERSIONED_SCHEMAS, SONG_TABLE_V_0};
use super::trait_def::{ensure_active, ensure_valid, CatalogError, CatalogRepository};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, ErrorCode, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::info;

const SONG_COLUMNS: &str = "id, relative_path, filename, title, artist, album, genre, year, \
     track_number, duration_seconds, artwork_path, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

fn entry_from_row(row: &Row) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        relative_path: row.get(1)?,
        filename: row.get(2)?,
        metadata: TrackMetadata {
            title: row.get(3)?,
            artist: row.get(4)?,
            album: row.get(5)?,
            genre: row.get(6)?,
            year: row.get(7)?,
            track_number: row.get(8)?,
            duration_seconds: row.get(9)?,
            artwork_path: row.get(10)?,
        },
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let mut conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database")?;

        open_versioned(&mut conn, CATALOG_VERSIONED_SCHEMAS)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let song_count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", SONG_TABLE_V_0.name),
                [],
                |r| r.get(0),
            )
            .unwrap_or(0);
        info!("Opened catalog with {} songs", song_count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Storage(anyhow!("catalog connection lock poisoned")))
    }
}

impl CatalogRepository for SqliteCatalogStore {
    fn list_all(&self, ctx: &CancellationToken) -> Result<Vec<CatalogEntry>, CatalogError> {
        ensure_active(ctx)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY relative_path",
            SONG_COLUMNS, SONG_TABLE_V_0.name
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn get(&self, ctx: &CancellationToken, id: &str) -> Result<CatalogEntry, CatalogError> {
        ensure_active(ctx)?;
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                SONG_COLUMNS, SONG_TABLE_V_0.name
            ),
            params![id],
            entry_from_row,
        );
        match result {
            Ok(entry) => Ok(entry),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(CatalogError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError> {
        ensure_active(ctx)?;
        ensure_valid(entry)?;
        let conn = self.lock()?;
        let m = &entry.metadata;
        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                SONG_TABLE_V_0.name, SONG_COLUMNS
            ),
            params![
                entry.id,
                entry.relative_path,
                entry.filename,
                m.title,
                m.artist,
                m.album,
                m.genre,
                m.year,
                m.track_number,
                m.duration_seconds,
                m.artwork_path,
                entry.created_at,
                entry.updated_at,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                CatalogError::DuplicatePath(entry.relative_path.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn update(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError> {
        ensure_active(ctx)?;
        ensure_valid(entry)?;
        let conn = self.lock()?;
        let m = &entry.metadata;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE {} SET relative_path = ?2, filename = ?3, title = ?4, artist = ?5, \
                     album = ?6, genre = ?7, year = ?8, track_number = ?9, \
                     duration_seconds = ?10, artwork_path = ?11, updated_at = ?12 WHERE id = ?1",
                    SONG_TABLE_V_0.name
                ),
                params![
                    entry.id,
                    entry.relative_path,
                    entry.filename,
                    m.title,
                    m.artist,
                    m.album,
                    m.genre,
                    m.year,
                    m.track_number,
                    m.duration_seconds,
                    m.artwork_path,
                    entry.updated_at,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    CatalogError::DuplicatePath(entry.relative_path.clone())
                } else {
                    e.into()
                }
            })?;
        if changed == 0 {
            return Err(CatalogError::NotFound(entry.id.clone()));
        }
        Ok(())
    }

    fn delete(&self, ctx: &CancellationToken, entry: &CatalogEntry) -> Result<(), CatalogError> {
        ensure_active(ctx)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", SONG_TABLE_V_0.name),
            params![entry.id],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(entry.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_tmp_store() -> (SqliteCatalogStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteCatalogStore::new(temp_dir.path().join("catalog.db")).unwrap();
        (store, temp_dir)
    }

    fn entry(path: &str, title: &str) -> CatalogEntry {
        CatalogEntry::new(
            path,
            TrackMetadata {
                title: title.to_string(),
                artist: "Artist".to_string(),
                year: 1999,
                track_number: 3,
                artwork_path: Some("abc.jpg".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn creates_and_lists_entries() {
        let (store, _temp_dir) = create_tmp_store();
        let ctx = CancellationToken::new();

        let b = entry("b/song.mp3", "B");
        let a = entry("a/song.flac", "A");
        store.create(&ctx, &b).unwrap();
        store.create(&ctx, &a).unwrap();

        let all = store.list_all(&ctx).unwrap();
        assert_eq!(all, vec![a.clone(), b]);
        assert_eq!(store.get(&ctx, &a.id).unwrap(), a);
    }

    #[test]
    fn rejects_duplicate_and_empty_paths() {
        let (store, _temp_dir) = create_tmp_store();
        let ctx = CancellationToken::new();

        store.create(&ctx, &entry("same.mp3", "One")).unwrap();
        assert!(matches!(
            store.create(&ctx, &entry("same.mp3", "Two")),
            Err(CatalogError::DuplicatePath(p)) if p == "same.mp3"
        ));
        assert!(matches!(
            store.create(&ctx, &entry("", "Empty")),
            Err(CatalogError::EmptyPath)
        ));
        assert_eq!(store.list_all(&ctx).unwrap().len(), 1);
    }

    #[test]
    fn updates_and_deletes_by_id() {
        let (store, _temp_dir) = create_tmp_store();
        let ctx = CancellationToken::new();

        let original = entry("x.m4a", "Before");
        store.create(&ctx, &original).unwrap();

        let mut metadata = original.metadata.clone();
        metadata.title = "After".to_string();
        metadata.artwork_path = None;
        let updated = original.with_metadata(metadata);
        store.update(&ctx, &updated).unwrap();
        assert_eq!(store.get(&ctx, &original.id).unwrap(), updated);

        store.delete(&ctx, &updated).unwrap();
        assert!(matches!(
            store.get(&ctx, &original.id),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(&ctx, &updated),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            store.update(&ctx, &updated),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn honors_cancellation() {
        let (store, _temp_dir) = create_tmp_store();
        let ctx = CancellationToken::new();
        ctx.cancel();

        assert!(matches!(store.list_all(&ctx), Err(CatalogError::Cancelled)));
        assert!(matches!(
            store.create(&ctx, &entry("a.mp3", "A")),
            Err(CatalogError::Cancelled)
        ));
    }

    #[test]
    fn reopens_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.db");
        let ctx = CancellationToken::new();
        {
            let store = SqliteCatalogStore::new(&path).unwrap();
            store.create(&ctx, &entry("keep.mp3", "Keep")).unwrap();
        }
        let store = SqliteCatalogStore::new(&path).unwrap();
        assert_eq!(store.list_all(&ctx).unwrap().len(), 1);
    }
}
