//! Shared mock collaborators for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use gatefs::backend::{ByteReader, ByteWriter};
use gatefs::resolver::Clock;
use gatefs::{
    BackendFactory, BackendSpec, Catalog, Credential, Error, FilesetIdent, MetadataClient,
    RawEntry, Result, StorageBackend,
};

/// A clock the test advances by hand.
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(ManualClock {
            now_ms: AtomicI64::new(start_ms),
        })
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Catalog serving one storage root for every fileset, with counted,
/// optionally slowed credential calls.
#[derive(Debug)]
pub struct MockCatalog {
    pub properties: HashMap<String, String>,
    pub storage_root: String,
    pub credentials: Vec<Credential>,
    pub credential_calls: AtomicUsize,
    pub credential_delay: Option<Duration>,
    /// Fileset names the catalog claims not to know.
    pub missing_filesets: Vec<String>,
}

impl MockCatalog {
    pub fn new(storage_root: &str) -> Self {
        MockCatalog {
            properties: HashMap::new(),
            storage_root: storage_root.to_string(),
            credentials: Vec::new(),
            credential_calls: AtomicUsize::new(0),
            credential_delay: None,
            missing_filesets: Vec::new(),
        }
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    async fn file_location(
        &self,
        ident: &FilesetIdent,
        sub_path: &str,
        _location_name: Option<&str>,
    ) -> Result<String> {
        if self.missing_filesets.contains(&ident.name) {
            return Err(Error::FilesetNotFound {
                path: ident.virtual_location(),
                op: gatefs::FileOp::GetFileStatus,
            });
        }
        Ok(format!("{}{}", self.storage_root, sub_path))
    }

    async fn credentials(&self, _ident: &FilesetIdent) -> Result<Vec<Credential>> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.credential_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.credentials.clone())
    }
}

/// Metadata client with per-catalog load counters.
#[derive(Default)]
pub struct MockClient {
    pub catalogs: HashMap<String, Arc<MockCatalog>>,
    pub load_calls: std::sync::Mutex<HashMap<String, usize>>,
}

impl MockClient {
    pub fn with_catalog(name: &str, catalog: MockCatalog) -> Arc<Self> {
        let mut client = MockClient::default();
        client.catalogs.insert(name.to_string(), Arc::new(catalog));
        Arc::new(client)
    }

    pub fn loads_of(&self, name: &str) -> usize {
        *self
            .load_calls
            .lock()
            .expect("load counter lock")
            .get(name)
            .unwrap_or(&0)
    }
}

#[async_trait]
impl MetadataClient for MockClient {
    async fn load_catalog(&self, name: &str) -> Result<Arc<dyn Catalog>> {
        *self
            .load_calls
            .lock()
            .expect("load counter lock")
            .entry(name.to_string())
            .or_insert(0) += 1;
        match self.catalogs.get(name) {
            Some(catalog) => Ok(catalog.clone() as Arc<dyn Catalog>),
            None => Err(Error::CatalogNotFound(name.to_string())),
        }
    }
}

/// Backend serving canned listings; every mutation succeeds silently.
#[derive(Debug)]
pub struct CannedBackend {
    pub entries: Vec<RawEntry>,
    pub existing: bool,
}

#[async_trait]
impl StorageBackend for CannedBackend {
    async fn list(&self, _path: &str) -> Result<Vec<RawEntry>> {
        Ok(self.entries.clone())
    }

    async fn info(&self, path: &str) -> Result<RawEntry> {
        self.entries
            .first()
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("no entry for {path}")))
    }

    async fn exists(&self, _path: &str) -> Result<bool> {
        Ok(self.existing)
    }

    async fn open(&self, _path: &str) -> Result<ByteReader> {
        Ok(Box::new(std::io::Cursor::new(Vec::new())))
    }

    async fn create(&self, _path: &str) -> Result<ByteWriter> {
        Ok(Box::new(Vec::new()))
    }

    async fn cat(&self, _path: &str, _range: Option<Range<u64>>) -> Result<Bytes> {
        Ok(Bytes::new())
    }

    async fn mkdir(&self, _path: &str, _create_parents: bool) -> Result<()> {
        Ok(())
    }

    async fn makedirs(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn rm(&self, _path: &str, _recursive: bool) -> Result<()> {
        Ok(())
    }

    async fn rm_file(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn rmdir(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn mv(&self, _src: &str, _dst: &str) -> Result<()> {
        Ok(())
    }

    async fn cp_file(&self, _src: &str, _dst: &str) -> Result<()> {
        Ok(())
    }
}

/// Factory that counts constructions and records the specs it saw.
#[derive(Default)]
pub struct CountingFactory {
    pub built: AtomicUsize,
    pub entries: std::sync::Mutex<Vec<RawEntry>>,
    pub specs: std::sync::Mutex<Vec<BackendSpec>>,
}

impl CountingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(CountingFactory::default())
    }

    pub fn with_entries(entries: Vec<RawEntry>) -> Arc<Self> {
        let factory = CountingFactory::default();
        *factory.entries.lock().expect("entries lock") = entries;
        Arc::new(factory)
    }

    pub fn build_count(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn last_spec(&self) -> Option<BackendSpec> {
        self.specs.lock().expect("spec lock").last().cloned()
    }
}

impl BackendFactory for CountingFactory {
    fn build(&self, spec: &BackendSpec) -> Result<Arc<dyn StorageBackend>> {
        self.built.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().expect("spec lock").push(spec.clone());
        Ok(Arc::new(CannedBackend {
            entries: self.entries.lock().expect("entries lock").clone(),
            existing: true,
        }))
    }
}
