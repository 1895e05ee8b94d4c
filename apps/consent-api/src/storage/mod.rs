//! Durable backends for the submission index and artifact store

pub mod fs;
pub mod http;
pub mod sqlite;

use std::path::{Component, Path};

use consent_core::StorageError;

pub use fs::FsArtifactStore;
pub use http::HttpObjectStore;
pub use sqlite::SqliteIndex;

/// Split a logical artifact path into its names
///
/// Every component must be a plain name: no root, no `.` or `..`. Artifact
/// paths come from clients on the download route, so both backends check
/// them before touching storage.
pub fn path_segments(path: &str) -> Result<Vec<&str>, StorageError> {
    let invalid = || StorageError::InvalidPath(path.to_string());
    let mut segments = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(name) => segments.push(name.to_str().ok_or_else(invalid)?),
            _ => return Err(invalid()),
        }
    }
    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments)
}
