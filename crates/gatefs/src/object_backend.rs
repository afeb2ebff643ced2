//! Default backend factory built on the `object_store` crate.
//!
//! Covers local disk, S3-compatible stores (including OSS through an
//! endpoint override), GCS, and Azure Blob Storage. HDFS has no
//! object_store client; deployments that need it inject their own
//! [`BackendFactory`].

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::buffered::{BufReader, BufWriter};
use object_store::gcp::{GcpCredential, GoogleCloudStorageBuilder};
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use object_store::{ObjectMeta, ObjectStore, StaticCredentialProvider};
use url::Url;

use crate::backend::{
    BackendFactory, BackendSpec, ByteReader, ByteWriter, EntryKind, RawEntry, StorageBackend,
};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::storage::{AbsLocation, StorageType};

/// Builds `object_store`-based backend handles from a [`BackendSpec`].
#[derive(Debug, Clone, Default)]
pub struct ObjectStoreFactory;

impl BackendFactory for ObjectStoreFactory {
    fn build(&self, spec: &BackendSpec) -> Result<Arc<dyn StorageBackend>> {
        let backend = match spec.storage_type {
            StorageType::Local => ObjectStoreBackend {
                store: Arc::new(LocalFileSystem::new()),
                storage_type: StorageType::Local,
                naming: Naming::Local,
            },
            StorageType::S3a => build_s3(spec, "s3a")?,
            StorageType::Oss => build_oss(spec)?,
            StorageType::Gcs => build_gcs(spec)?,
            StorageType::Abs => build_abs(spec)?,
            StorageType::Hdfs => {
                return Err(Error::UnsupportedStorageType(spec.location.clone()));
            }
        };
        Ok(Arc::new(backend))
    }
}

fn bucket_of(location: &str) -> Result<String> {
    Url::parse(location)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| Error::UnsupportedStorageType(location.to_string()))
}

fn build_s3(spec: &BackendSpec, scheme: &'static str) -> Result<ObjectStoreBackend> {
    let bucket = bucket_of(&spec.location)?;
    let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
    if std::env::var("AWS_REGION").is_err() && std::env::var("AWS_DEFAULT_REGION").is_err() {
        builder = builder.with_region("us-east-1");
    }
    if let Some(endpoint) = &spec.endpoint {
        builder = builder.with_endpoint(endpoint);
        if endpoint.starts_with("http://") {
            builder = builder.with_allow_http(true);
        }
    }
    match &spec.credential {
        Some(Credential::S3Token {
            access_key_id,
            secret_access_key,
            session_token,
            ..
        }) => {
            builder = builder
                .with_access_key_id(access_key_id)
                .with_secret_access_key(secret_access_key)
                .with_token(session_token);
        }
        Some(Credential::S3SecretKey {
            access_key_id,
            secret_access_key,
        }) => {
            builder = builder
                .with_access_key_id(access_key_id)
                .with_secret_access_key(secret_access_key);
        }
        _ => {}
    }
    Ok(ObjectStoreBackend {
        store: Arc::new(builder.build()?),
        storage_type: StorageType::S3a,
        naming: Naming::SchemeBucket { scheme, bucket },
    })
}

/// OSS is driven through the S3-compatible surface: endpoint override
/// plus virtual-hosted addressing.
fn build_oss(spec: &BackendSpec) -> Result<ObjectStoreBackend> {
    let bucket = bucket_of(&spec.location)?;
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&bucket)
        .with_region("oss")
        .with_virtual_hosted_style_request(true);
    if let Some(endpoint) = &spec.endpoint {
        builder = builder.with_endpoint(endpoint);
        if endpoint.starts_with("http://") {
            builder = builder.with_allow_http(true);
        }
    }
    match &spec.credential {
        Some(Credential::OssToken {
            access_key_id,
            secret_access_key,
            security_token,
            ..
        }) => {
            builder = builder
                .with_access_key_id(access_key_id)
                .with_secret_access_key(secret_access_key)
                .with_token(security_token);
        }
        Some(Credential::OssSecretKey {
            access_key_id,
            secret_access_key,
        }) => {
            builder = builder
                .with_access_key_id(access_key_id)
                .with_secret_access_key(secret_access_key);
        }
        _ => {}
    }
    Ok(ObjectStoreBackend {
        store: Arc::new(builder.build()?),
        storage_type: StorageType::Oss,
        naming: Naming::Bucket { bucket },
    })
}

fn build_gcs(spec: &BackendSpec) -> Result<ObjectStoreBackend> {
    let bucket = bucket_of(&spec.location)?;
    let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&bucket);
    match &spec.credential {
        Some(Credential::GcsToken { token, .. }) => {
            builder = builder.with_credentials(Arc::new(StaticCredentialProvider::new(
                GcpCredential {
                    bearer: token.clone(),
                },
            )));
        }
        Some(Credential::GcsServiceAccountFile { path }) => {
            builder = builder.with_service_account_path(path);
        }
        _ => {}
    }
    Ok(ObjectStoreBackend {
        store: Arc::new(builder.build()?),
        storage_type: StorageType::Gcs,
        naming: Naming::SchemeBucket {
            scheme: "gs",
            bucket,
        },
    })
}

fn build_abs(spec: &BackendSpec) -> Result<ObjectStoreBackend> {
    let parts = AbsLocation::parse(&spec.location)?;
    let mut builder = MicrosoftAzureBuilder::new()
        .with_account(parts.account_name())
        .with_container_name(&parts.container);
    match &spec.credential {
        Some(Credential::AdlsSasToken { sas_token, .. }) => {
            builder = builder.with_config(AzureConfigKey::SasKey, sas_token);
        }
        Some(Credential::AzureAccountKey { account_key, .. }) => {
            builder = builder.with_access_key(account_key);
        }
        _ => {}
    }
    Ok(ObjectStoreBackend {
        store: Arc::new(builder.build()?),
        storage_type: StorageType::Abs,
        naming: Naming::Bucket {
            bucket: parts.container,
        },
    })
}

/// How stripped paths map onto store keys and how store keys map back to
/// the backend's native path form.
#[derive(Debug)]
enum Naming {
    /// Bare absolute paths, `/tmp/x`.
    Local,
    /// Full URI form, `s3a://bucket/key`.
    SchemeBucket {
        scheme: &'static str,
        bucket: String,
    },
    /// Bucket- or container-relative form, `bucket/key`.
    Bucket { bucket: String },
}

#[derive(Debug)]
struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    storage_type: StorageType,
    naming: Naming,
}

impl ObjectStoreBackend {
    fn key(&self, stripped: &str) -> Result<StorePath> {
        let relative = match &self.naming {
            Naming::Local => {
                return StorePath::from_absolute_path(stripped)
                    .map_err(|source| Error::Storage(object_store::Error::InvalidPath { source }));
            }
            Naming::SchemeBucket { scheme, bucket } => {
                let prefix = format!("{scheme}://{bucket}/");
                stripped
                    .strip_prefix(&prefix)
                    .ok_or_else(|| Error::PathPrefixMismatch {
                        path: stripped.to_string(),
                        prefix,
                    })?
            }
            Naming::Bucket { bucket } => {
                let prefix = format!("{bucket}/");
                stripped
                    .strip_prefix(&prefix)
                    .ok_or_else(|| Error::PathPrefixMismatch {
                        path: stripped.to_string(),
                        prefix,
                    })?
            }
        };
        Ok(StorePath::from(relative))
    }

    fn native(&self, location: &StorePath) -> String {
        match &self.naming {
            Naming::Local => format!("/{location}"),
            Naming::SchemeBucket { scheme, bucket } => format!("{scheme}://{bucket}/{location}"),
            Naming::Bucket { bucket } => format!("{bucket}/{location}"),
        }
    }

    /// Populates the modification-time field this backend's native
    /// listing would use.
    fn file_entry(&self, meta: &ObjectMeta) -> RawEntry {
        let modified = meta.last_modified.timestamp_millis();
        let mut entry = RawEntry {
            name: self.native(&meta.location),
            size: meta.size,
            kind: EntryKind::File,
            mtime: None,
            object_modified: None,
            blob_modified: None,
        };
        match self.storage_type {
            StorageType::Hdfs | StorageType::Gcs | StorageType::Local => {
                entry.mtime = Some(modified);
            }
            StorageType::S3a | StorageType::Oss => entry.object_modified = Some(modified),
            StorageType::Abs => entry.blob_modified = Some(modified),
        }
        entry
    }

    fn dir_entry(&self, location: &StorePath) -> RawEntry {
        RawEntry {
            name: self.native(location),
            size: 0,
            kind: EntryKind::Directory,
            mtime: None,
            object_modified: None,
            blob_modified: None,
        }
    }

    fn is_local(&self) -> bool {
        matches!(self.naming, Naming::Local)
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn list(&self, path: &str) -> Result<Vec<RawEntry>> {
        let prefix = self.key(path)?;
        let listing = self.store.list_with_delimiter(Some(&prefix)).await?;
        let mut entries: Vec<RawEntry> = listing
            .common_prefixes
            .iter()
            .map(|p| self.dir_entry(p))
            .collect();
        entries.extend(listing.objects.iter().map(|m| self.file_entry(m)));
        Ok(entries)
    }

    async fn info(&self, path: &str) -> Result<RawEntry> {
        let key = self.key(path)?;
        match self.store.head(&key).await {
            Ok(meta) => Ok(self.file_entry(&meta)),
            Err(object_store::Error::NotFound { .. }) => {
                // Not an object; report it as a directory if anything
                // lives under the prefix.
                let listing = self.store.list_with_delimiter(Some(&key)).await?;
                if listing.objects.is_empty() && listing.common_prefixes.is_empty() {
                    Err(Error::Storage(object_store::Error::NotFound {
                        path: path.to_string(),
                        source: "no object or prefix at path".into(),
                    }))
                } else {
                    Ok(self.dir_entry(&key))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        match self.info(path).await {
            Ok(_) => Ok(true),
            Err(Error::Storage(object_store::Error::NotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn open(&self, path: &str) -> Result<ByteReader> {
        let key = self.key(path)?;
        let meta = self.store.head(&key).await?;
        Ok(Box::new(BufReader::new(Arc::clone(&self.store), &meta)))
    }

    async fn create(&self, path: &str) -> Result<ByteWriter> {
        let key = self.key(path)?;
        Ok(Box::new(BufWriter::new(Arc::clone(&self.store), key)))
    }

    async fn cat(&self, path: &str, range: Option<Range<u64>>) -> Result<Bytes> {
        let key = self.key(path)?;
        match range {
            Some(range) => Ok(self.store.get_range(&key, range).await?),
            None => Ok(self.store.get(&key).await?.bytes().await?),
        }
    }

    async fn mkdir(&self, path: &str, create_parents: bool) -> Result<()> {
        // Object stores have no directories; only local disk needs one.
        if self.is_local() {
            if create_parents {
                tokio::fs::create_dir_all(path).await?;
            } else {
                tokio::fs::create_dir(path).await?;
            }
        }
        Ok(())
    }

    async fn makedirs(&self, path: &str) -> Result<()> {
        self.mkdir(path, true).await
    }

    async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        if self.is_local() {
            let meta = tokio::fs::metadata(path).await?;
            if meta.is_dir() {
                if recursive {
                    tokio::fs::remove_dir_all(path).await?;
                } else {
                    tokio::fs::remove_dir(path).await?;
                }
            } else {
                tokio::fs::remove_file(path).await?;
            }
            return Ok(());
        }
        let key = self.key(path)?;
        if recursive {
            let mut objects = self.store.list(Some(&key));
            while let Some(meta) = objects.try_next().await? {
                self.store.delete(&meta.location).await?;
            }
            Ok(())
        } else {
            Ok(self.store.delete(&key).await?)
        }
    }

    async fn rm_file(&self, path: &str) -> Result<()> {
        let key = self.key(path)?;
        Ok(self.store.delete(&key).await?)
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        // Local refuses to remove a non-empty directory; object stores
        // treat the prefix as removable content.
        if self.is_local() {
            return Ok(tokio::fs::remove_dir(path).await?);
        }
        self.rm(path, true).await
    }

    async fn mv(&self, src: &str, dst: &str) -> Result<()> {
        if self.is_local() {
            return Ok(tokio::fs::rename(src, dst).await?);
        }
        let from = self.key(src)?;
        let to = self.key(dst)?;
        Ok(self.store.rename(&from, &to).await?)
    }

    async fn cp_file(&self, src: &str, dst: &str) -> Result<()> {
        let from = self.key(src)?;
        let to = self.key(dst)?;
        Ok(self.store.copy(&from, &to).await?)
    }
}
