mod library_scan;
mod session_cleanup;

pub use library_scan::LibraryScanJob;
pub use session_cleanup::SessionCleanupJob;
