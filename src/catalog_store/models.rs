//! Catalog records.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// The metadata the scanner derives for one audio file.
///
/// This is everything a catalog entry holds apart from its identity and
/// timestamps; two entries are "unchanged" exactly when these agree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub year: u32,
    pub track_number: u32,
    pub duration_seconds: u32,
    pub artwork_path: Option<String>,
}

/// A persisted song, keyed by its path relative to the music root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub relative_path: String,
    pub filename: String,
    #[serde(flatten)]
    pub metadata: TrackMetadata,
    pub created_at: i64,
    pub updated_at: i64,
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl CatalogEntry {
    /// Creates a brand new entry with a fresh id.
    pub fn new(relative_path: impl Into<String>, metadata: TrackMetadata) -> Self {
        let relative_path = relative_path.into();
        let filename = relative_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let now = unix_now();
        Self {
            id: Uuid::new_v4().to_string(),
            relative_path,
            filename,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the metadata, keeping id and creation time.
    pub fn with_metadata(&self, metadata: TrackMetadata) -> Self {
        Self {
            metadata,
            updated_at: unix_now(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_filename_from_relative_path() {
        let entry = CatalogEntry::new("Artist/Album/01 Song.flac", TrackMetadata::default());
        assert_eq!(entry.filename, "01 Song.flac");

        let entry = CatalogEntry::new("top.mp3", TrackMetadata::default());
        assert_eq!(entry.filename, "top.mp3");
    }

    #[test]
    fn with_metadata_preserves_identity() {
        let original = CatalogEntry::new("a.mp3", TrackMetadata::default());
        let updated = original.with_metadata(TrackMetadata {
            title: "New".to_string(),
            ..Default::default()
        });

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.relative_path, original.relative_path);
        assert_eq!(updated.metadata.title, "New");
    }
}
