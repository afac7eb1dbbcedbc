//! Attachment path resolution.
//!
//! The archive stores attachment paths relative to the owner's home using a
//! leading `~`. Resolution is a prefix substitution followed by an existence
//! check, done fresh on every call.

use std::path::{Path, PathBuf};

/// Home directory alias used by the archive.
const HOME_ALIAS: char = '~';

/// An attachment path after alias expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path (or the stored path unchanged if no home is known)
    pub path: PathBuf,
    /// Whether the file exists right now
    pub exists: bool,
}

/// Resolve a stored attachment filename against the current user's home.
#[must_use]
pub fn resolve(filename: &str) -> ResolvedPath {
    resolve_with_home(filename, dirs::home_dir().as_deref())
}

/// Resolve a stored attachment filename against an explicit home directory.
#[must_use]
pub fn resolve_with_home(filename: &str, home: Option<&Path>) -> ResolvedPath {
    let path = expand_alias(filename, home);
    let exists = path.exists();
    ResolvedPath { path, exists }
}

/// Expand a leading `~` against the current user's home. Does not touch the filesystem.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    expand_alias(path, dirs::home_dir().as_deref())
}

/// Expand a leading `~` against `home`; the path is returned unchanged without one.
#[must_use]
pub fn expand_alias(filename: &str, home: Option<&Path>) -> PathBuf {
    let (Some(rest), Some(home)) = (filename.strip_prefix(HOME_ALIAS), home) else {
        return PathBuf::from(filename);
    };

    // "~/x" and "~" only; "~bob/x" is not ours to expand
    match rest.strip_prefix('/') {
        Some(tail) => home.join(tail),
        None if rest.is_empty() => home.to_path_buf(),
        None => PathBuf::from(filename),
    }
}
