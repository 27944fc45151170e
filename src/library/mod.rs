//! The music library engine: tag extraction, artwork storage, path
//! confinement and catalog reconciliation.

mod artwork;
mod error;
mod path_guard;
mod scanner;
mod service;
pub mod tags;

pub use artwork::{content_identity, ArtworkStore, ARTWORK_EXTENSION};
pub use error::{ArtworkError, FileError, ResolveError, ScanError, TagError};
pub use path_guard::PathGuard;
pub use scanner::{is_supported, relative_key, ScanResult, Scanner, SUPPORTED_EXTENSIONS};
#[cfg(test)]
pub(crate) use service::ScanGuard;
pub use service::{log_scan_outcome, LibraryService};
