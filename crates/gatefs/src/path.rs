//! Virtual ↔ actual path translation.
//!
//! Conversion back to virtual form is a bijection restricted to paths
//! under the fileset's storage root; anything outside that prefix fails
//! closed rather than being silently truncated.

use crate::backend::{FileStatus, RawEntry};
use crate::error::{Error, Result};
use crate::ident::VIRTUAL_PREFIX;
use crate::storage::StorageType;

/// The optional scheme marker callers may attach to virtual paths.
pub const VIRTUAL_SCHEME: &str = "gvfs://";

/// Normalizes a caller-supplied virtual path: accepts both
/// `gvfs://fileset/…` and bare `fileset/…`, returning the bare form.
pub fn pre_process_path(virtual_path: &str) -> Result<String> {
    let path = virtual_path
        .strip_prefix(VIRTUAL_SCHEME)
        .unwrap_or(virtual_path);
    if !path.starts_with(VIRTUAL_PREFIX) {
        return Err(Error::MalformedPath(virtual_path.to_string()));
    }
    Ok(path.to_string())
}

/// Converts an actual backend path into virtual form by replacing the
/// storage-root prefix with the fileset's logical root.
///
/// Backends return paths in varying shapes (with or without scheme,
/// container-relative on Azure), so the match is attempted against the
/// full storage location first and the backend-specific actual prefix
/// second.
pub fn convert_actual_path(
    actual_path: &str,
    storage_location: &str,
    virtual_location: &str,
) -> Result<String> {
    let storage_type = StorageType::classify(storage_location)?;
    let actual = storage_type.normalize_actual_path(actual_path, storage_location)?;

    let prefix = if actual.starts_with(storage_location) {
        storage_location.to_string()
    } else {
        storage_type.actual_prefix(storage_location)?
    };
    if !actual.starts_with(&prefix) {
        return Err(Error::PathPrefixMismatch {
            path: actual,
            prefix,
        });
    }

    // A storage root ending in `/` would otherwise leave a doubled
    // separator after substitution.
    let prefix = if prefix.ends_with('/') && !virtual_location.ends_with('/') {
        &prefix[..prefix.len() - 1]
    } else {
        &prefix[..]
    };
    Ok(format!("{}{}", virtual_location, &actual[prefix.len()..]))
}

/// Normalizes a backend entry: translated virtual name plus a single
/// `mtime` field regardless of which name the backend used.
pub fn convert_actual_info(
    entry: &RawEntry,
    storage_location: &str,
    virtual_location: &str,
) -> Result<FileStatus> {
    let name = convert_actual_path(&entry.name, storage_location, virtual_location)?;
    Ok(FileStatus {
        name,
        size: entry.size,
        kind: entry.kind,
        mtime: entry.modified_ms(),
    })
}
