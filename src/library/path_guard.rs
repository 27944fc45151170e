//! Confines caller-supplied relative paths to a root directory.

use super::error::ResolveError;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// `root` is made absolute against the current directory; it does not
    /// have to exist yet.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            root: std::path::absolute(root.as_ref())?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexically resolves `requested` under the root without touching the
    /// filesystem.
    ///
    /// Both `/` and `\` separate segments and a leading separator still
    /// means "relative to the root". `.` segments are dropped and `..` pops
    /// the previous segment; popping past the root is a traversal.
    pub fn confine(&self, requested: &str) -> Result<PathBuf, ResolveError> {
        let normalized = requested.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(ResolveError::PathTraversal(requested.to_string()));
                    }
                }
                other => {
                    // Anything that is not a plain name (a drive prefix, say)
                    // could replace the root when joined.
                    let mut components = Path::new(other).components();
                    match (components.next(), components.next()) {
                        (Some(std::path::Component::Normal(_)), None) => segments.push(other),
                        _ => return Err(ResolveError::PathTraversal(requested.to_string())),
                    }
                }
            }
        }

        let joined = segments
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment));
        if !joined.starts_with(&self.root) {
            return Err(ResolveError::PathTraversal(requested.to_string()));
        }
        Ok(joined)
    }

    /// Resolves `requested` to an existing path inside the root.
    ///
    /// Lexical escapes are rejected before any filesystem access. The result
    /// is canonicalized and checked again, so a symlink pointing out of the
    /// root is a traversal as well.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ResolveError> {
        let candidate = self.confine(requested)?;
        if !candidate.exists() {
            return Err(ResolveError::NotFound(requested.to_string()));
        }

        let canonical_root = self.root.canonicalize()?;
        let canonical = candidate.canonicalize()?;
        if !canonical.starts_with(&canonical_root) {
            return Err(ResolveError::PathTraversal(requested.to_string()));
        }
        Ok(canonical)
    }
}
