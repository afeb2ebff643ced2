//! Error types for virtual fileset operations.

use crate::fs::FileOp;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "malformed virtual path `{0}`: expected fileset/{{catalog}}/{{schema}}/{{fileset}}[/sub/path]"
    )]
    MalformedPath(String),

    #[error("path `{path}` not found for operation {op}")]
    FilesetNotFound { path: String, op: FileOp },

    #[error("catalog `{0}` not found or not in use")]
    CatalogNotFound(String),

    #[error("no credential for {backend} backend: supply one via the catalog or set `{option}`")]
    MissingCredential {
        backend: &'static str,
        option: &'static str,
    },

    #[error("unsupported storage location `{0}`")]
    UnsupportedStorageType(String),

    #[error("path `{path}` does not start with expected prefix `{prefix}`")]
    PathPrefixMismatch { path: String, prefix: String },

    #[error("destination fileset `{dst}` must match source fileset `{src}`")]
    IdentifierMismatch { src: String, dst: String },

    // Backend I/O errors pass through unreinterpreted.
    #[error("object store error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata service error: {0}")]
    Metadata(String),
}

impl Error {
    /// Whether this error means the fileset or catalog does not exist, as
    /// opposed to a genuine fault. Existence-style callers convert these
    /// to a negative result instead of propagating.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::FilesetNotFound { .. } | Error::CatalogNotFound(_)
        )
    }
}
