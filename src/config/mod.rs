mod file_config;

pub use file_config::{FileConfig, ScanConfig};

use crate::server::RequestsLoggingLevel;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const MUSIC_DIRECTORY_ENV: &str = "MUSIC_DIRECTORY";
pub const ALBUM_ART_DIRECTORY_ENV: &str = "ALBUM_ART_DIRECTORY";

/// Upper bounds for the duration settings, ten years each.
const MAX_SCAN_INTERVAL_MINUTES: u64 = 10 * 365 * 24 * 60;
const MAX_SESSION_TTL_DAYS: u64 = 10 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{setting} is not configured: pass --{flag}, set `{key}` in the config file or set {env_var}")]
    MissingDirectory {
        setting: &'static str,
        flag: &'static str,
        key: &'static str,
        env_var: &'static str,
    },

    #[error("db_dir must be specified via --db-dir or in config file")]
    MissingDbDir,

    #[error("Database directory does not exist: {0:?}")]
    DbDirNotFound(PathBuf),

    #[error("db_dir is not a directory: {0:?}")]
    DbDirNotADirectory(PathBuf),

    #[error("Failed to read config file {path:?}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{setting} = {value} is out of range (at most {max})")]
    OutOfRange {
        setting: &'static str,
        value: u64,
        max: u64,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Roots the library engine works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub music_root: PathBuf,
    pub artwork_root: PathBuf,
}

/// Settings read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub music_dir: Option<PathBuf>,
    pub artwork_dir: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dir = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        };
        Self {
            music_dir: dir(MUSIC_DIRECTORY_ENV),
            artwork_dir: dir(ALBUM_ART_DIRECTORY_ENV),
        }
    }
}

/// CLI arguments that take part in config resolution.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub music_dir: Option<PathBuf>,
    pub artwork_dir: Option<PathBuf>,
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub session_ttl_days: u64,
    pub scan_interval_minutes: u64,
    pub scan_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub library: LibraryConfig,
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub session_ttl: Duration,
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSettings {
    /// `None` disables periodic scans.
    pub interval: Option<Duration>,
    pub on_startup: bool,
}

impl AppConfig {
    /// Resolves the configuration. For every setting the config file wins
    /// over the command line, which wins over the environment.
    pub fn resolve(
        cli: &CliConfig,
        env: &EnvConfig,
        file_config: Option<FileConfig>,
    ) -> Result<Self, ConfigError> {
        let file = file_config.unwrap_or_default();

        let music_root = file
            .music_dir
            .map(PathBuf::from)
            .or_else(|| cli.music_dir.clone())
            .or_else(|| env.music_dir.clone())
            .ok_or(ConfigError::MissingDirectory {
                setting: "music directory",
                flag: "music-dir",
                key: "music_dir",
                env_var: MUSIC_DIRECTORY_ENV,
            })?;

        let artwork_root = file
            .artwork_dir
            .map(PathBuf::from)
            .or_else(|| cli.artwork_dir.clone())
            .or_else(|| env.artwork_dir.clone())
            .ok_or(ConfigError::MissingDirectory {
                setting: "album art directory",
                flag: "artwork-dir",
                key: "artwork_dir",
                env_var: ALBUM_ART_DIRECTORY_ENV,
            })?;

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or(ConfigError::MissingDbDir)?;
        if !db_dir.exists() {
            return Err(ConfigError::DbDirNotFound(db_dir));
        }
        if !db_dir.is_dir() {
            return Err(ConfigError::DbDirNotADirectory(db_dir));
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let scan_file = file.scan.unwrap_or_default();
        let interval_minutes = scan_file
            .interval_minutes
            .unwrap_or(cli.scan_interval_minutes);
        let interval = match interval_minutes {
            0 => None,
            minutes => Some(checked_duration(
                "scan_interval_minutes",
                minutes,
                MAX_SCAN_INTERVAL_MINUTES,
                60,
            )?),
        };
        let scan = ScanSettings {
            interval,
            on_startup: scan_file.on_startup.unwrap_or(cli.scan_on_startup),
        };

        Ok(Self {
            library: LibraryConfig {
                music_root,
                artwork_root,
            },
            db_dir,
            port: file.port.unwrap_or(cli.port),
            logging_level,
            frontend_dir_path: file
                .frontend_dir_path
                .or_else(|| cli.frontend_dir_path.clone()),
            session_ttl: checked_duration(
                "session_ttl_days",
                file.session_ttl_days.unwrap_or(cli.session_ttl_days),
                MAX_SESSION_TTL_DAYS,
                24 * 60 * 60,
            )?,
            scan,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }
}

fn checked_duration(
    setting: &'static str,
    value: u64,
    max: u64,
    unit_secs: u64,
) -> Result<Duration, ConfigError> {
    if value > max {
        return Err(ConfigError::OutOfRange {
            setting,
            value,
            max,
        });
    }
    Ok(Duration::from_secs(value * unit_secs))
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
