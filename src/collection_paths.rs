//! Purpose: Collection-name to file-path resolution.
//! Exports: `resolve_collection_path`, `CollectionNameError`, `COLLECTION_EXTENSION`.
//! Role: Keep library and CLI path semantics aligned from one source.
//! Invariants: One name maps to exactly one file `<dir>/<name>.ndjson`.
//! Invariants: Names must not escape the database directory.

use std::path::{Path, PathBuf};

pub(crate) const COLLECTION_EXTENSION: &str = "ndjson";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum CollectionNameError {
    Empty,
    Reserved,
    ContainsPathSeparator,
}

pub(crate) fn resolve_collection_path(
    name: &str,
    dir: &Path,
) -> Result<PathBuf, CollectionNameError> {
    if name.is_empty() {
        return Err(CollectionNameError::Empty);
    }
    if name == "." || name == ".." {
        return Err(CollectionNameError::Reserved);
    }
    if name.contains('/') || (cfg!(windows) && name.contains('\\')) {
        return Err(CollectionNameError::ContainsPathSeparator);
    }
    Ok(dir.join(format!("{name}.{COLLECTION_EXTENSION}")))
}
