use super::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Contents of the optional TOML configuration file. Every key is optional;
/// present keys override the command line.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub music_dir: Option<String>,
    pub artwork_dir: Option<String>,
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub session_ttl_days: Option<u64>,

    pub scan: Option<ScanConfig>,
}

/// The `[scan]` table.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScanConfig {
    pub interval_minutes: Option<u64>,
    pub on_startup: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::UnreadableFile {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content).map_err(|source| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
