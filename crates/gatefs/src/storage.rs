//! Storage-type classification and scheme handling.
//!
//! Each supported backend has its own convention for whether the scheme
//! (and host/account) stays attached to paths handed to the native
//! client. These rules are empirical per backend, not generic URI
//! parsing, and must not be "simplified".

use url::Url;

use crate::error::{Error, Result};

/// The closed set of storage backends a fileset location may live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// Distributed filesystem, `hdfs://host:port/path`.
    Hdfs,
    /// Local disk, `file:/path`.
    Local,
    /// Google Cloud Storage, `gs://bucket/path`.
    Gcs,
    /// S3-compatible object store, `s3a://bucket/path`.
    S3a,
    /// Aliyun OSS object store, `oss://bucket/path`.
    Oss,
    /// Azure Blob Storage, `abfss://container@account/path`.
    Abs,
}

impl StorageType {
    pub fn scheme(&self) -> &'static str {
        match self {
            StorageType::Hdfs => "hdfs",
            StorageType::Local => "file",
            StorageType::Gcs => "gs",
            StorageType::S3a => "s3a",
            StorageType::Oss => "oss",
            StorageType::Abs => "abfss",
        }
    }

    /// Classifies a concrete location by its scheme prefix.
    pub fn classify(location: &str) -> Result<StorageType> {
        if location.starts_with("hdfs://") {
            Ok(StorageType::Hdfs)
        } else if location.starts_with("file:/") {
            Ok(StorageType::Local)
        } else if location.starts_with("gs://") {
            Ok(StorageType::Gcs)
        } else if location.starts_with("s3a://") {
            Ok(StorageType::S3a)
        } else if location.starts_with("oss://") {
            Ok(StorageType::Oss)
        } else if location.starts_with("abfss://") {
            Ok(StorageType::Abs)
        } else {
            Err(Error::UnsupportedStorageType(location.to_string()))
        }
    }

    /// Strips the scheme-specific prefix a backend's native calls cannot
    /// tolerate.
    ///
    /// HDFS, GCS and S3A clients take the full URI. The local backend
    /// takes a bare filesystem path. OSS listings silently come back
    /// empty if the scheme is left attached, so it is removed. Azure
    /// wants `container/path`, with the account carried separately by
    /// the client.
    pub fn strip_scheme(&self, path: &str) -> Result<String> {
        match self {
            StorageType::Hdfs | StorageType::Gcs | StorageType::S3a => Ok(path.to_string()),
            StorageType::Local => Ok(path.strip_prefix("file:").unwrap_or(path).to_string()),
            StorageType::Oss => Ok(path.strip_prefix("oss://").unwrap_or(path).to_string()),
            StorageType::Abs => {
                let parts = AbsLocation::parse(path)?;
                Ok(format!("{}{}", parts.container, parts.path))
            }
        }
    }

    /// The prefix that paths returned by this backend actually carry,
    /// derived from the fileset's storage location. Used when mapping
    /// actual paths back to virtual form.
    pub fn actual_prefix(&self, storage_location: &str) -> Result<String> {
        match self {
            StorageType::Hdfs => {
                let url = parse_location(storage_location)?;
                Ok(url.path().to_string())
            }
            StorageType::Gcs | StorageType::S3a | StorageType::Oss => {
                let url = parse_location(storage_location)?;
                let host = url
                    .host_str()
                    .ok_or_else(|| Error::UnsupportedStorageType(storage_location.to_string()))?;
                Ok(format!("{}{}", host, url.path()))
            }
            // Azure keeps the full container@account form; entries that
            // come back container-relative are re-attached first.
            StorageType::Abs => {
                AbsLocation::parse(storage_location)?;
                Ok(storage_location.to_string())
            }
            StorageType::Local => Ok(storage_location
                .strip_prefix("file:")
                .unwrap_or(storage_location)
                .to_string()),
        }
    }

    /// Rewrites a backend-returned path into the same form
    /// [`Self::actual_prefix`] produces. Only Azure needs work: its
    /// listings drop the scheme and account, returning `container/path`.
    pub fn normalize_actual_path(&self, actual_path: &str, storage_location: &str) -> Result<String> {
        if *self != StorageType::Abs || actual_path.starts_with("abfss://") {
            return Ok(actual_path.to_string());
        }
        let parts = AbsLocation::parse(storage_location)?;
        let relative = actual_path
            .split_once('/')
            .map(|(_, rest)| rest)
            .unwrap_or("");
        Ok(format!(
            "abfss://{}@{}/{}",
            parts.container, parts.account, relative
        ))
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Decomposed `abfss://container@account/path` location.
pub(crate) struct AbsLocation {
    pub container: String,
    pub account: String,
    pub path: String,
}

impl AbsLocation {
    /// The bare account name, without the endpoint suffix.
    pub fn account_name(&self) -> &str {
        self.account.split('.').next().unwrap_or(&self.account)
    }

    pub fn parse(location: &str) -> Result<AbsLocation> {
        let url = parse_location(location)?;
        let container = url.username();
        let account = url.host_str().unwrap_or_default();
        if container.is_empty() || account.is_empty() {
            return Err(Error::UnsupportedStorageType(location.to_string()));
        }
        Ok(AbsLocation {
            container: container.to_string(),
            account: account.to_string(),
            path: url.path().to_string(),
        })
    }
}

fn parse_location(location: &str) -> Result<Url> {
    Url::parse(location).map_err(|_| Error::UnsupportedStorageType(location.to_string()))
}
