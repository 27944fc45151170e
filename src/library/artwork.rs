//! Content-addressed artwork storage.
//!
//! Every embedded picture is stored once, as `<sha256 of the raw bytes>.jpg`
//! directly under the artwork root. Songs carrying byte-identical pictures
//! share one file, even across unrelated albums. Files are never rewritten:
//! an existing identity is returned as is.

use super::error::ArtworkError;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const ARTWORK_EXTENSION: &str = "jpg";
pub const JPEG_QUALITY: u8 = 90;

/// Identity used when the content hash cannot be computed.
pub const PLACEHOLDER_IDENTITY: &str = "unknown_hash";

pub struct ArtworkStore {
    root: PathBuf,
}

/// Hex SHA-256 of everything `reader` yields.
pub fn content_identity<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

impl ArtworkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `raw` and returns its path relative to the artwork root.
    pub fn store(&self, raw: &[u8]) -> Result<String, ArtworkError> {
        let image = image::load_from_memory(raw).map_err(ArtworkError::InvalidImage)?;

        let identity = content_identity(raw).unwrap_or_else(|err| {
            warn!("Could not hash artwork, using placeholder identity: {}", err);
            PLACEHOLDER_IDENTITY.to_string()
        });
        let file_name = format!("{}.{}", identity, ARTWORK_EXTENSION);
        let target = self.root.join(&file_name);

        if target.exists() {
            debug!("Artwork {} already stored", file_name);
            return Ok(file_name);
        }

        fs::create_dir_all(&self.root)?;
        self.write_jpeg(&image, &target)?;
        debug!("Stored artwork {}", file_name);
        Ok(file_name)
    }

    /// Encodes into a temporary file next to `target`, then renames it, so
    /// readers never observe a half-written image.
    fn write_jpeg(&self, image: &DynamicImage, target: &Path) -> Result<(), ArtworkError> {
        let temp = NamedTempFile::new_in(&self.root)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
                .encode_image(&image.to_rgb8())
                .map_err(ArtworkError::Encode)?;
            writer.flush()?;
        }
        temp.persist(target).map_err(|e| ArtworkError::Io(e.error))?;
        Ok(())
    }
}
