//! The virtual filesystem operation surface.
//!
//! Every operation takes a virtual path, resolves it to a concrete
//! location plus an authenticated backend handle, strips the scheme the
//! backend cannot tolerate, delegates, and translates any returned paths
//! back to virtual form.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::backend::{BackendFactory, ByteReader, ByteWriter, FileStatus, StorageBackend};
use crate::client::MetadataClient;
use crate::config::GvfsOptions;
use crate::error::{Error, Result};
use crate::ident::FilesetIdent;
use crate::object_backend::ObjectStoreFactory;
use crate::path::{convert_actual_info, convert_actual_path, pre_process_path};
use crate::resolver::FilesetResolver;
use crate::storage::StorageType;

/// The data operation being performed, carried in not-found errors and
/// logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    ListStatus,
    GetFileStatus,
    Exists,
    Open,
    OpenAndWrite,
    CatFile,
    Mkdirs,
    Delete,
    Rename,
    CopyFile,
    ModifiedTime,
    GetFile,
}

impl std::fmt::Display for FileOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileOp::ListStatus => "LIST_STATUS",
            FileOp::GetFileStatus => "GET_FILE_STATUS",
            FileOp::Exists => "EXISTS",
            FileOp::Open => "OPEN",
            FileOp::OpenAndWrite => "OPEN_AND_WRITE",
            FileOp::CatFile => "CAT_FILE",
            FileOp::Mkdirs => "MKDIRS",
            FileOp::Delete => "DELETE",
            FileOp::Rename => "RENAME",
            FileOp::CopyFile => "COPY_FILE",
            FileOp::ModifiedTime => "MODIFIED_TIME",
            FileOp::GetFile => "GET_FILE",
        };
        f.write_str(name)
    }
}

/// Resolution result for one operation: the concrete location and the
/// backend handle that serves it.
struct FilesetContext {
    ident: FilesetIdent,
    actual_location: String,
    storage_type: StorageType,
    backend: Arc<dyn StorageBackend>,
    sub_path: String,
}

impl FilesetContext {
    /// The fileset's storage root: the actual location minus the
    /// operation's sub-path.
    fn storage_location(&self) -> &str {
        self.actual_location
            .strip_suffix(&self.sub_path)
            .unwrap_or(&self.actual_location)
    }

    /// The actual location in the form the backend's native calls want.
    fn stripped(&self) -> Result<String> {
        self.storage_type.strip_scheme(&self.actual_location)
    }
}

/// A filesystem over logical `fileset/{catalog}/{schema}/{fileset}/…`
/// paths, backed by heterogeneous storage reached through short-lived
/// credentials.
pub struct VirtualFileSystem {
    metalake: String,
    current_location_name: Option<String>,
    resolver: FilesetResolver,
}

impl VirtualFileSystem {
    /// Creates a filesystem using the default object-store backend
    /// factory.
    pub fn new(
        metalake: impl Into<String>,
        client: Arc<dyn MetadataClient>,
        options: GvfsOptions,
    ) -> Self {
        Self::with_factory(metalake, client, Arc::new(ObjectStoreFactory), options)
    }

    pub fn with_factory(
        metalake: impl Into<String>,
        client: Arc<dyn MetadataClient>,
        factory: Arc<dyn BackendFactory>,
        options: GvfsOptions,
    ) -> Self {
        Self::from_resolver(metalake, FilesetResolver::new(client, factory, options))
    }

    /// Wraps a pre-built resolver; useful when the caller needs a
    /// non-default clock.
    pub fn from_resolver(metalake: impl Into<String>, resolver: FilesetResolver) -> Self {
        diagnostics::init_diagnostics();
        let current_location_name = resolver.options().resolve_current_location_name();
        VirtualFileSystem {
            metalake: metalake.into(),
            current_location_name,
            resolver,
        }
    }

    /// Lists entries with normalized metadata and virtual-form names.
    pub async fn ls(&self, virtual_path: &str) -> Result<Vec<FileStatus>> {
        let op = FileOp::ListStatus;
        let ctx = self.require_context(virtual_path, op).await?;
        let entries = ctx.backend.list(&ctx.stripped()?).await?;
        let virtual_location = ctx.ident.virtual_location();
        entries
            .iter()
            .map(|entry| convert_actual_info(entry, ctx.storage_location(), &virtual_location))
            .collect()
    }

    /// Lists entry names only, in virtual form.
    pub async fn ls_paths(&self, virtual_path: &str) -> Result<Vec<String>> {
        let op = FileOp::ListStatus;
        let ctx = self.require_context(virtual_path, op).await?;
        let entries = ctx.backend.list(&ctx.stripped()?).await?;
        let virtual_location = ctx.ident.virtual_location();
        entries
            .iter()
            .map(|entry| convert_actual_path(&entry.name, ctx.storage_location(), &virtual_location))
            .collect()
    }

    pub async fn info(&self, virtual_path: &str) -> Result<FileStatus> {
        let op = FileOp::GetFileStatus;
        let ctx = self.require_context(virtual_path, op).await?;
        let entry = ctx.backend.info(&ctx.stripped()?).await?;
        convert_actual_info(&entry, ctx.storage_location(), &ctx.ident.virtual_location())
    }

    /// Existence check: a missing catalog or fileset is a plain `false`,
    /// not an error.
    pub async fn exists(&self, virtual_path: &str) -> Result<bool> {
        let Some(ctx) = self.context(virtual_path, FileOp::Exists).await? else {
            return Ok(false);
        };
        ctx.backend.exists(&ctx.stripped()?).await
    }

    /// Opens a file for reading.
    pub async fn open(&self, virtual_path: &str) -> Result<ByteReader> {
        let ctx = self.require_context(virtual_path, FileOp::Open).await?;
        ctx.backend.open(&ctx.stripped()?).await
    }

    /// Opens a file for writing, replacing existing content.
    pub async fn create(&self, virtual_path: &str) -> Result<ByteWriter> {
        let ctx = self.require_context(virtual_path, FileOp::OpenAndWrite).await?;
        ctx.backend.create(&ctx.stripped()?).await
    }

    /// Reads file content, optionally restricted to a byte range.
    pub async fn cat_file(&self, virtual_path: &str, range: Option<Range<u64>>) -> Result<Bytes> {
        let ctx = self.require_context(virtual_path, FileOp::CatFile).await?;
        ctx.backend.cat(&ctx.stripped()?, range).await
    }

    pub async fn mkdir(&self, virtual_path: &str, create_parents: bool) -> Result<()> {
        let ctx = self.require_context(virtual_path, FileOp::Mkdirs).await?;
        ctx.backend.mkdir(&ctx.stripped()?, create_parents).await
    }

    pub async fn makedirs(&self, virtual_path: &str) -> Result<()> {
        let ctx = self.require_context(virtual_path, FileOp::Mkdirs).await?;
        ctx.backend.makedirs(&ctx.stripped()?).await
    }

    /// Removes a file or directory, recursively when asked.
    pub async fn rm(&self, virtual_path: &str, recursive: bool) -> Result<()> {
        let ctx = self.require_context(virtual_path, FileOp::Delete).await?;
        ctx.backend.rm(&ctx.stripped()?, recursive).await
    }

    pub async fn rm_file(&self, virtual_path: &str) -> Result<()> {
        let ctx = self.require_context(virtual_path, FileOp::Delete).await?;
        ctx.backend.rm_file(&ctx.stripped()?).await
    }

    pub async fn rmdir(&self, virtual_path: &str) -> Result<()> {
        let ctx = self.require_context(virtual_path, FileOp::Delete).await?;
        ctx.backend.rmdir(&ctx.stripped()?).await
    }

    /// Moves a file within one fileset. Source and destination must name
    /// the same fileset.
    pub async fn mv(&self, src_path: &str, dst_path: &str) -> Result<()> {
        let (src_ctx, dst_ctx) = self.same_fileset_pair(src_path, dst_path, FileOp::Rename).await?;
        src_ctx
            .backend
            .mv(&src_ctx.stripped()?, &dst_ctx.stripped()?)
            .await
    }

    /// Copies a file within one fileset.
    pub async fn cp_file(&self, src_path: &str, dst_path: &str) -> Result<()> {
        let (src_ctx, dst_ctx) = self
            .same_fileset_pair(src_path, dst_path, FileOp::CopyFile)
            .await?;
        src_ctx
            .backend
            .cp_file(&src_ctx.stripped()?, &dst_ctx.stripped()?)
            .await
    }

    /// Modification time in epoch milliseconds, when the backend reports
    /// one.
    pub async fn modified(&self, virtual_path: &str) -> Result<Option<i64>> {
        let ctx = self.require_context(virtual_path, FileOp::ModifiedTime).await?;
        let entry = ctx.backend.info(&ctx.stripped()?).await?;
        Ok(entry.modified_ms())
    }

    /// Copies a remote file to the local filesystem.
    pub async fn get_file(&self, virtual_path: &str, local_path: &Path) -> Result<()> {
        let ctx = self.require_context(virtual_path, FileOp::GetFile).await?;
        let mut reader = ctx.backend.open(&ctx.stripped()?).await?;
        let mut file = tokio::fs::File::create(local_path).await?;
        tokio::io::copy(&mut reader, &mut file).await?;
        Ok(())
    }

    async fn same_fileset_pair(
        &self,
        src_path: &str,
        dst_path: &str,
        op: FileOp,
    ) -> Result<(FilesetContext, FilesetContext)> {
        let src = pre_process_path(src_path)?;
        let dst = pre_process_path(dst_path)?;
        let src_ident = FilesetIdent::extract(&self.metalake, &src)?;
        let dst_ident = FilesetIdent::extract(&self.metalake, &dst)?;
        if src_ident != dst_ident {
            return Err(Error::IdentifierMismatch {
                src: src_ident.to_string(),
                dst: dst_ident.to_string(),
            });
        }
        let src_ctx = self.require_context(src_path, op).await?;
        let dst_ctx = self.require_context(dst_path, op).await?;
        Ok((src_ctx, dst_ctx))
    }

    async fn require_context(&self, virtual_path: &str, op: FileOp) -> Result<FilesetContext> {
        self.context(virtual_path, op)
            .await?
            .ok_or_else(|| Error::FilesetNotFound {
                path: virtual_path.to_string(),
                op,
            })
    }

    /// Resolves a virtual path to its context. `Ok(None)` means the
    /// catalog or fileset does not exist; callers decide whether that is
    /// an error or a negative result.
    async fn context(&self, virtual_path: &str, op: FileOp) -> Result<Option<FilesetContext>> {
        let path = pre_process_path(virtual_path)?;
        let ident = FilesetIdent::extract(&self.metalake, &path)?;

        let catalog = match self.resolver.catalog(&ident.catalog).await {
            Ok(catalog) => catalog,
            Err(e) if e.is_not_found() => {
                diagnostics::log_warn!(
                    "catalog for {path} not found during {op}",
                    path: path.as_str(),
                    op: op.to_string()
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let sub_path = ident.sub_path_of(&path);
        let location_name = self.current_location_name.as_deref();
        let actual_location = match catalog.file_location(&ident, &sub_path, location_name).await {
            Ok(location) => location,
            Err(e) if e.is_not_found() => {
                diagnostics::log_warn!(
                    "file location for {path} not found during {op}",
                    path: path.as_str(),
                    op: op.to_string()
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let storage_type = StorageType::classify(&actual_location)?;
        let backend = self
            .resolver
            .backend(&actual_location, &catalog, &ident, location_name)
            .await?;
        Ok(Some(FilesetContext {
            ident,
            actual_location,
            storage_type,
            backend,
            sub_path,
        }))
    }
}
