//! Test fixture creation for music libraries
//!
//! Audio files are synthesized FLAC streams: a STREAMINFO block, a Vorbis
//! comment block and optionally a PICTURE block. They carry no audio frames,
//! which is enough for tag extraction and duration reporting.

use super::constants::*;
use image::{ImageFormat, Rgb, RgbImage};
use musicbox_server::config::LibraryConfig;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BLOCK_STREAMINFO: u8 = 0;
const BLOCK_VORBIS_COMMENT: u8 = 4;
const BLOCK_PICTURE: u8 = 6;
const PICTURE_TYPE_FRONT_COVER: u32 = 3;

/// Encodes a tiny solid-color PNG.
pub fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(4, 4, Rgb(color));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    bytes.into_inner()
}

/// Builds the bytes of a tagged FLAC file.
#[derive(Clone, Debug, Default)]
pub struct FlacBuilder {
    comments: Vec<(String, String)>,
    duration_seconds: u32,
    picture: Option<Vec<u8>>,
}

impl FlacBuilder {
    pub fn new() -> Self {
        Self {
            duration_seconds: 1,
            ..Default::default()
        }
    }

    fn comment(mut self, key: &str, value: impl ToString) -> Self {
        self.comments.push((key.to_string(), value.to_string()));
        self
    }

    pub fn title(self, title: &str) -> Self {
        self.comment("TITLE", title)
    }

    pub fn artist(self, artist: &str) -> Self {
        self.comment("ARTIST", artist)
    }

    pub fn album(self, album: &str) -> Self {
        self.comment("ALBUM", album)
    }

    pub fn genre(self, genre: &str) -> Self {
        self.comment("GENRE", genre)
    }

    pub fn date(self, date: &str) -> Self {
        self.comment("DATE", date)
    }

    pub fn track_number(self, track_number: u32) -> Self {
        self.comment("TRACKNUMBER", track_number)
    }

    pub fn duration_seconds(mut self, duration_seconds: u32) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    /// Embeds `image` as the front cover.
    pub fn picture(mut self, image: Vec<u8>) -> Self {
        self.picture = Some(image);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut blocks = vec![
            (BLOCK_STREAMINFO, self.stream_info()),
            (BLOCK_VORBIS_COMMENT, self.vorbis_comment()),
        ];
        if let Some(picture) = &self.picture {
            blocks.push((BLOCK_PICTURE, picture_block(picture)));
        }

        let mut bytes = b"fLaC".to_vec();
        let last_index = blocks.len() - 1;
        for (index, (block_type, content)) in blocks.into_iter().enumerate() {
            let last_flag = if index == last_index { 0x80 } else { 0 };
            bytes.push(last_flag | block_type);
            bytes.extend_from_slice(&(content.len() as u32).to_be_bytes()[1..]);
            bytes.extend_from_slice(&content);
        }
        bytes
    }

    /// Writes the file, creating parent directories.
    pub fn write_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        fs::write(path, self.build()).expect("Failed to write FLAC fixture");
    }

    fn stream_info(&self) -> Vec<u8> {
        let channels: u64 = 2;
        let bits_per_sample: u64 = 16;
        let total_samples = self.duration_seconds as u64 * FIXTURE_SAMPLE_RATE as u64;

        let mut info = Vec::with_capacity(34);
        info.extend_from_slice(&4096u16.to_be_bytes()); // min block size
        info.extend_from_slice(&4096u16.to_be_bytes()); // max block size
        info.extend_from_slice(&[0; 3]); // min frame size, unknown
        info.extend_from_slice(&[0; 3]); // max frame size, unknown
        let packed = (FIXTURE_SAMPLE_RATE as u64) << 44
            | (channels - 1) << 41
            | (bits_per_sample - 1) << 36
            | total_samples;
        info.extend_from_slice(&packed.to_be_bytes());
        info.extend_from_slice(&[0; 16]); // md5
        info
    }

    fn vorbis_comment(&self) -> Vec<u8> {
        let vendor = b"musicbox tests";
        let mut block = Vec::new();
        block.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        block.extend_from_slice(vendor);
        block.extend_from_slice(&(self.comments.len() as u32).to_le_bytes());
        for (key, value) in &self.comments {
            let comment = format!("{}={}", key, value);
            block.extend_from_slice(&(comment.len() as u32).to_le_bytes());
            block.extend_from_slice(comment.as_bytes());
        }
        block
    }
}

fn picture_block(data: &[u8]) -> Vec<u8> {
    let mime = b"image/png";
    let mut block = Vec::new();
    block.extend_from_slice(&PICTURE_TYPE_FRONT_COVER.to_be_bytes());
    block.extend_from_slice(&(mime.len() as u32).to_be_bytes());
    block.extend_from_slice(mime);
    block.extend_from_slice(&0u32.to_be_bytes()); // description length
    block.extend_from_slice(&4u32.to_be_bytes()); // width
    block.extend_from_slice(&4u32.to_be_bytes()); // height
    block.extend_from_slice(&24u32.to_be_bytes()); // color depth
    block.extend_from_slice(&0u32.to_be_bytes()); // indexed colors
    block.extend_from_slice(&(data.len() as u32).to_be_bytes());
    block.extend_from_slice(data);
    block
}

/// Temporary music, artwork and database directories.
pub struct LibraryDirs {
    temp_dir: TempDir,
}

impl LibraryDirs {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for dir in ["music", "art", "db"] {
            fs::create_dir_all(temp_dir.path().join(dir)).expect("Failed to create fixture dir");
        }
        Self { temp_dir }
    }

    pub fn music_dir(&self) -> PathBuf {
        self.temp_dir.path().join("music")
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.temp_dir.path().join("art")
    }

    pub fn db_dir(&self) -> PathBuf {
        self.temp_dir.path().join("db")
    }

    /// A directory next to the roots, outside both of them.
    pub fn outside_dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    pub fn library_config(&self) -> LibraryConfig {
        LibraryConfig {
            music_root: self.music_dir(),
            artwork_root: self.artwork_dir(),
        }
    }

    /// Stored artwork file names, sorted.
    pub fn stored_artwork(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.artwork_dir())
            .expect("Failed to read artwork dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".jpg"))
            .collect();
        names.sort();
        names
    }
}
