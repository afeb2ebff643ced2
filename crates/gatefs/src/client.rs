//! Metadata-service collaborator traits.
//!
//! The network client that actually talks to the metadata service lives
//! outside this crate; resolution only depends on these seams. Lookup
//! failures that mean "absent" must surface as
//! [`crate::error::Error::CatalogNotFound`] /
//! [`crate::error::Error::FilesetNotFound`] so callers can distinguish
//! them from genuine faults; anything else is passed through.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::Result;
use crate::ident::FilesetIdent;

/// A loaded catalog handle: storage-relevant properties plus the fileset
/// operations resolution needs.
#[async_trait]
pub trait Catalog: std::fmt::Debug + Send + Sync {
    /// Catalog-level properties (endpoint overrides and the like).
    fn properties(&self) -> &HashMap<String, String>;

    /// Resolves the concrete storage location for `sub_path` within the
    /// fileset, honoring the named location when `location_name` is set.
    async fn file_location(
        &self,
        ident: &FilesetIdent,
        sub_path: &str,
        location_name: Option<&str>,
    ) -> Result<String>;

    /// Lists the candidate credentials vended for the fileset. Never
    /// persisted by this crate.
    async fn credentials(&self, ident: &FilesetIdent) -> Result<Vec<Credential>>;
}

/// The metadata-service client boundary.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn load_catalog(&self, name: &str) -> Result<Arc<dyn Catalog>>;
}
