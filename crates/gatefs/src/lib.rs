#![allow(missing_docs)]

//! gatefs — a virtual fileset filesystem client.
//!
//! Callers address files through stable logical paths of the form
//! `fileset/{catalog}/{schema}/{fileset}/…` while the bytes live on one
//! of several storage backends, each reachable only through
//! backend-specific, often short-lived credentials. This crate resolves
//! a logical path to its concrete storage location and an authenticated
//! backend handle, caching catalog handles (LRU) and backend handles
//! (TTL plus credential-derived expiry) so concurrent callers never
//! construct the same expensive client twice.
//!
//! Set the `GATEFS_LOG` environment variable to control logging:
//! `off` (default), `error`, `warn`, `info`, or `debug`.

/// Virtual-path identifiers
pub mod ident;

/// Virtual ↔ actual path translation
pub mod path;

/// Storage-type classification and scheme stripping
pub mod storage;

/// Credential variants and selection policy
pub mod credential;

/// Client configuration
pub mod config;

/// Metadata-service collaborator traits
pub mod client;

/// Storage backend collaborator traits
pub mod backend;

/// Default object_store-backed backend factory
pub mod object_backend;

/// Catalog and backend-handle caching
pub mod resolver;

/// Public operation surface
pub mod fs;

/// Error types
pub mod error;

pub use backend::{BackendFactory, BackendSpec, EntryKind, FileStatus, RawEntry, StorageBackend};
pub use client::{Catalog, MetadataClient};
pub use config::GvfsOptions;
pub use credential::Credential;
pub use error::{Error, Result};
pub use fs::{FileOp, VirtualFileSystem};
pub use ident::FilesetIdent;
pub use object_backend::ObjectStoreFactory;
pub use resolver::{Clock, FilesetResolver, NEVER_EXPIRES, SystemClock};
pub use storage::StorageType;
