//! Storage backend collaborator traits and the metadata records they
//! exchange.
//!
//! Paths handed to a [`StorageBackend`] are already scheme-stripped per
//! [`crate::storage::StorageType::strip_scheme`]; paths it returns are in
//! the backend's native form and are translated back to virtual form by
//! the path translator before reaching callers.

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::credential::Credential;
use crate::error::Result;
use crate::storage::StorageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A metadata record as returned by a backend, before normalization.
///
/// Backends disagree on the modification-time field name: HDFS and GCS
/// report `mtime`, S3 and OSS report `LastModified`, Azure reports
/// `last_modified`. At most one of the three is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    #[serde(rename = "LastModified", default, skip_serializing_if = "Option::is_none")]
    pub object_modified: Option<i64>,
    #[serde(rename = "last_modified", default, skip_serializing_if = "Option::is_none")]
    pub blob_modified: Option<i64>,
}

impl RawEntry {
    /// The single normalized modification time, whichever field the
    /// backend populated.
    pub fn modified_ms(&self) -> Option<i64> {
        self.mtime.or(self.object_modified).or(self.blob_modified)
    }
}

/// A normalized metadata record with virtual-form name and a single
/// modification-time field, as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatus {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub mtime: Option<i64>,
}

pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An authenticated, ready-to-use client bound to one concrete storage
/// backend. Implementations are shared freely across concurrent callers
/// once constructed.
#[async_trait]
pub trait StorageBackend: std::fmt::Debug + Send + Sync {
    async fn list(&self, path: &str) -> Result<Vec<RawEntry>>;

    async fn info(&self, path: &str) -> Result<RawEntry>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn open(&self, path: &str) -> Result<ByteReader>;

    async fn create(&self, path: &str) -> Result<ByteWriter>;

    /// Reads file content, optionally restricted to a byte range.
    async fn cat(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes>;

    async fn mkdir(&self, path: &str, create_parents: bool) -> Result<()>;

    async fn makedirs(&self, path: &str) -> Result<()>;

    async fn rm(&self, path: &str, recursive: bool) -> Result<()>;

    async fn rm_file(&self, path: &str) -> Result<()>;

    async fn rmdir(&self, path: &str) -> Result<()>;

    async fn mv(&self, src: &str, dst: &str) -> Result<()>;

    async fn cp_file(&self, src: &str, dst: &str) -> Result<()>;
}

/// Everything a factory needs to construct one backend handle.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    pub storage_type: StorageType,
    /// The concrete storage location that triggered construction.
    pub location: String,
    /// The selected credential, or `None` for backends without a
    /// credential concept (HDFS, local).
    pub credential: Option<Credential>,
    /// Endpoint override, resolved from catalog properties first and
    /// static configuration second.
    pub endpoint: Option<String>,
}

/// Constructs backend handles. The default implementation is
/// [`crate::object_backend::ObjectStoreFactory`]; tests and deployments
/// with exotic backends inject their own.
pub trait BackendFactory: Send + Sync {
    fn build(&self, spec: &BackendSpec) -> Result<Arc<dyn StorageBackend>>;
}
