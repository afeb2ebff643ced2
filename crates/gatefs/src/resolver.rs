//! Catalog and backend-handle resolution with caching.
//!
//! Two independent caches, each behind its own `tokio::sync::RwLock`,
//! never nested: an LRU catalog cache and a bounded TTL cache of
//! authenticated backend handles keyed by (fileset identifier, location
//! name). Both use the read-then-write double-check so that an absent or
//! expired entry is constructed by at most one caller; entries are
//! inserted as a whole and replaced, never mutated, so readers cannot
//! observe partial construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::backend::{BackendFactory, BackendSpec, StorageBackend};
use crate::client::{Catalog, MetadataClient};
use crate::config::GvfsOptions;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::ident::FilesetIdent;
use crate::storage::StorageType;

/// Expiry sentinel for handles whose credentials never expire.
pub const NEVER_EXPIRES: i64 = i64::MAX;

/// Wall-clock source, injectable so cache timing is testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

struct CatalogEntry {
    catalog: Arc<dyn Catalog>,
    last_used: AtomicU64,
}

/// Bounded catalog cache with strict least-recently-used eviction and no
/// TTL; stale entries leave only under capacity pressure.
struct CatalogCache {
    max_entries: usize,
    tick: AtomicU64,
    entries: HashMap<String, CatalogEntry>,
}

impl CatalogCache {
    fn new(max_entries: usize) -> Self {
        CatalogCache {
            max_entries: max_entries.max(1),
            tick: AtomicU64::new(0),
            entries: HashMap::new(),
        }
    }

    /// Lookup that refreshes recency; safe under a read lock because
    /// recency is an atomic per entry.
    fn get(&self, name: &str) -> Option<Arc<dyn Catalog>> {
        let entry = self.entries.get(name)?;
        entry
            .last_used
            .store(self.tick.fetch_add(1, Ordering::Relaxed) + 1, Ordering::Relaxed);
        Some(entry.catalog.clone())
    }

    fn insert(&mut self, name: String, catalog: Arc<dyn Catalog>) {
        if !self.entries.contains_key(&name) && self.entries.len() >= self.max_entries {
            self.evict_least_recently_used();
        }
        let last_used = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.insert(
            name,
            CatalogEntry {
                catalog,
                last_used: AtomicU64::new(last_used),
            },
        );
    }

    fn evict_least_recently_used(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
            .map(|(k, _)| k.clone());
        if let Some(victim) = victim {
            self.entries.remove(&victim);
        }
    }
}

/// Backend cache key: one consistent shape, used both on the read check
/// and on the write-side re-check.
type BackendKey = (FilesetIdent, Option<String>);

struct BackendEntry {
    backend: Arc<dyn StorageBackend>,
    /// Credential-derived expiry in epoch millis, or [`NEVER_EXPIRES`].
    expires_at_ms: i64,
    inserted_at_ms: i64,
    last_used: AtomicU64,
}

/// Bounded backend-handle cache: entries are invisible past the earlier
/// of the credential-derived expiry and the wall-clock TTL.
struct BackendCache {
    max_entries: usize,
    ttl_ms: i64,
    tick: AtomicU64,
    entries: HashMap<BackendKey, BackendEntry>,
}

impl BackendCache {
    fn new(max_entries: usize, ttl_ms: i64) -> Self {
        BackendCache {
            max_entries: max_entries.max(1),
            ttl_ms,
            tick: AtomicU64::new(0),
            entries: HashMap::new(),
        }
    }

    fn is_live(&self, entry: &BackendEntry, now_ms: i64) -> bool {
        now_ms < entry.expires_at_ms && now_ms < entry.inserted_at_ms.saturating_add(self.ttl_ms)
    }

    fn get(&self, key: &BackendKey, now_ms: i64) -> Option<Arc<dyn StorageBackend>> {
        let entry = self.entries.get(key)?;
        if !self.is_live(entry, now_ms) {
            return None;
        }
        entry
            .last_used
            .store(self.tick.fetch_add(1, Ordering::Relaxed) + 1, Ordering::Relaxed);
        Some(entry.backend.clone())
    }

    fn insert(
        &mut self,
        key: BackendKey,
        backend: Arc<dyn StorageBackend>,
        expires_at_ms: i64,
        now_ms: i64,
    ) {
        self.entries.retain(|_, e| now_ms < e.inserted_at_ms.saturating_add(self.ttl_ms));
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        let last_used = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.insert(
            key,
            BackendEntry {
                backend,
                expires_at_ms,
                inserted_at_ms: now_ms,
                last_used: AtomicU64::new(last_used),
            },
        );
    }
}

/// The resolution engine: owns both caches for its lifetime, delegates
/// metadata lookups and handle construction to injected collaborators.
pub struct FilesetResolver {
    client: Arc<dyn MetadataClient>,
    factory: Arc<dyn BackendFactory>,
    clock: Arc<dyn Clock>,
    options: GvfsOptions,
    catalogs: RwLock<CatalogCache>,
    backends: RwLock<BackendCache>,
}

impl FilesetResolver {
    pub fn new(
        client: Arc<dyn MetadataClient>,
        factory: Arc<dyn BackendFactory>,
        options: GvfsOptions,
    ) -> Self {
        Self::with_clock(client, factory, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        client: Arc<dyn MetadataClient>,
        factory: Arc<dyn BackendFactory>,
        options: GvfsOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl_ms = i64::try_from(options.cache_ttl().as_millis()).unwrap_or(i64::MAX);
        FilesetResolver {
            catalogs: RwLock::new(CatalogCache::new(options.catalog_cache_max_entries)),
            backends: RwLock::new(BackendCache::new(options.cache_max_entries, ttl_ms)),
            client,
            factory,
            clock,
            options,
        }
    }

    pub fn options(&self) -> &GvfsOptions {
        &self.options
    }

    /// Returns the catalog handle for `name`, loading it through the
    /// metadata client on first use. "Not found" propagates as
    /// [`Error::CatalogNotFound`] and aborts the whole resolution.
    pub async fn catalog(&self, name: &str) -> Result<Arc<dyn Catalog>> {
        {
            let cache = self.catalogs.read().await;
            if let Some(catalog) = cache.get(name) {
                return Ok(catalog);
            }
        }

        let mut cache = self.catalogs.write().await;
        // Another caller may have loaded it while we waited for the
        // write lock.
        if let Some(catalog) = cache.get(name) {
            return Ok(catalog);
        }
        diagnostics::log_info!("loading catalog {name}", name: name);
        let catalog = self.client.load_catalog(name).await?;
        cache.insert(name.to_string(), catalog.clone());
        Ok(catalog)
    }

    /// Returns an authenticated backend handle for the fileset's storage
    /// location, reusing the cached handle while it is live.
    pub async fn backend(
        &self,
        location: &str,
        catalog: &Arc<dyn Catalog>,
        ident: &FilesetIdent,
        location_name: Option<&str>,
    ) -> Result<Arc<dyn StorageBackend>> {
        let storage_type = StorageType::classify(location)?;
        let key: BackendKey = (ident.clone(), location_name.map(str::to_string));

        {
            let cache = self.backends.read().await;
            if let Some(backend) = cache.get(&key, self.clock.now_ms()) {
                return Ok(backend);
            }
        }

        let mut cache = self.backends.write().await;
        if let Some(backend) = cache.get(&key, self.clock.now_ms()) {
            return Ok(backend);
        }

        // Construction happens under the write lock: that is what makes
        // it at-most-once per key under contention. The lock is coarse,
        // so construction for one key blocks lookups of every key.
        let (backend, expires_at_ms) = self
            .construct_backend(storage_type, location, catalog, ident)
            .await?;
        cache.insert(key, backend.clone(), expires_at_ms, self.clock.now_ms());
        Ok(backend)
    }

    async fn construct_backend(
        &self,
        storage_type: StorageType,
        location: &str,
        catalog: &Arc<dyn Catalog>,
        ident: &FilesetIdent,
    ) -> Result<(Arc<dyn StorageBackend>, i64)> {
        let credential = match storage_type {
            StorageType::Hdfs | StorageType::Local => None,
            _ => {
                let candidates = catalog.credentials(ident).await?;
                match Credential::select_best(&candidates, storage_type) {
                    Some(credential) => Some(credential.clone()),
                    None => {
                        diagnostics::log_debug!(
                            "no vended credential for {ident}, falling back to static configuration",
                            ident: ident.to_string()
                        );
                        Some(self.static_credential(storage_type)?)
                    }
                }
            }
        };

        let expires_at_ms = self.expiry_for(credential.as_ref());
        let spec = BackendSpec {
            storage_type,
            location: location.to_string(),
            credential,
            endpoint: self.endpoint_for(storage_type, catalog),
        };
        diagnostics::log_info!(
            "constructing {storage_type} backend for {ident}",
            storage_type: storage_type.scheme(),
            ident: ident.to_string()
        );
        let backend = self.factory.build(&spec)?;
        Ok((backend, expires_at_ms))
    }

    /// Static-configuration fallback used when the metadata service
    /// vends no usable credential.
    fn static_credential(&self, storage_type: StorageType) -> Result<Credential> {
        match storage_type {
            StorageType::S3a => {
                let access_key_id = self.options.s3.access_key_id.clone().ok_or(
                    Error::MissingCredential {
                        backend: "s3",
                        option: "s3.access-key-id",
                    },
                )?;
                let secret_access_key = self.options.s3.secret_access_key.clone().ok_or(
                    Error::MissingCredential {
                        backend: "s3",
                        option: "s3.secret-access-key",
                    },
                )?;
                Ok(Credential::S3SecretKey {
                    access_key_id,
                    secret_access_key,
                })
            }
            StorageType::Oss => {
                let access_key_id = self.options.oss.access_key_id.clone().ok_or(
                    Error::MissingCredential {
                        backend: "oss",
                        option: "oss.access-key-id",
                    },
                )?;
                let secret_access_key = self.options.oss.secret_access_key.clone().ok_or(
                    Error::MissingCredential {
                        backend: "oss",
                        option: "oss.secret-access-key",
                    },
                )?;
                Ok(Credential::OssSecretKey {
                    access_key_id,
                    secret_access_key,
                })
            }
            StorageType::Gcs => {
                let path = self.options.gcs.service_account_key_file.clone().ok_or(
                    Error::MissingCredential {
                        backend: "gcs",
                        option: "gcs.service-account-key-file",
                    },
                )?;
                Ok(Credential::GcsServiceAccountFile { path })
            }
            StorageType::Abs => {
                let account_name = self.options.azure.account_name.clone().ok_or(
                    Error::MissingCredential {
                        backend: "azure",
                        option: "azure.account-name",
                    },
                )?;
                let account_key = self.options.azure.account_key.clone().ok_or(
                    Error::MissingCredential {
                        backend: "azure",
                        option: "azure.account-key",
                    },
                )?;
                Ok(Credential::AzureAccountKey {
                    account_name,
                    account_key,
                })
            }
            StorageType::Hdfs | StorageType::Local => Err(Error::UnsupportedStorageType(
                storage_type.scheme().to_string(),
            )),
        }
    }

    /// Endpoint override: catalog properties first, static configuration
    /// second. The endpoint may point at an S3-compatible emulation, so
    /// it is applied even where the SDK could infer one.
    fn endpoint_for(&self, storage_type: StorageType, catalog: &Arc<dyn Catalog>) -> Option<String> {
        match storage_type {
            StorageType::S3a => catalog
                .properties()
                .get("s3-endpoint")
                .cloned()
                .or_else(|| self.options.s3.endpoint.clone()),
            StorageType::Oss => catalog
                .properties()
                .get("oss-endpoint")
                .cloned()
                .or_else(|| self.options.oss.endpoint.clone()),
            _ => None,
        }
    }

    /// Handle expiry: a configurable fraction of the credential's
    /// remaining lifetime, so the cached handle dies before the real
    /// credential does. No credential, or no reported expiry, means
    /// never.
    fn expiry_for(&self, credential: Option<&Credential>) -> i64 {
        let Some(expires_at_ms) = credential.and_then(Credential::expires_at_ms) else {
            return NEVER_EXPIRES;
        };
        let now = self.clock.now_ms();
        let remaining = (expires_at_ms - now) as f64 * self.options.credential_expiry_ratio;
        now.saturating_add(remaining as i64)
    }
}
