//! Fileset identifiers extracted from virtual paths.

use crate::error::{Error, Result};

/// The fixed prefix every virtual path must carry.
pub const VIRTUAL_PREFIX: &str = "fileset/";

/// Identifies one fileset: metalake, catalog, schema, and fileset name.
///
/// Derived purely from parsing a virtual path; equality is structural
/// over all four components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilesetIdent {
    pub metalake: String,
    pub catalog: String,
    pub schema: String,
    pub name: String,
}

impl FilesetIdent {
    /// Extracts the identifier from a pre-processed virtual path of the
    /// form `fileset/{catalog}/{schema}/{fileset}[/sub/path]`.
    pub fn extract(metalake: &str, virtual_path: &str) -> Result<Self> {
        let rest = virtual_path
            .strip_prefix(VIRTUAL_PREFIX)
            .ok_or_else(|| Error::MalformedPath(virtual_path.to_string()))?;

        let mut segments = rest.splitn(4, '/');
        let catalog = segments.next().unwrap_or_default();
        let schema = segments.next().unwrap_or_default();
        let name = segments.next().unwrap_or_default();
        if catalog.is_empty() || schema.is_empty() || name.is_empty() {
            return Err(Error::MalformedPath(virtual_path.to_string()));
        }

        Ok(FilesetIdent {
            metalake: metalake.to_string(),
            catalog: catalog.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
        })
    }

    /// The logical root of this fileset, `fileset/{catalog}/{schema}/{name}`.
    pub fn virtual_location(&self) -> String {
        format!(
            "{}{}/{}/{}",
            VIRTUAL_PREFIX, self.catalog, self.schema, self.name
        )
    }

    /// The remainder of `virtual_path` beyond the fileset boundary,
    /// starting with `/` when non-empty.
    pub fn sub_path_of(&self, virtual_path: &str) -> String {
        virtual_path[self.virtual_location().len()..].to_string()
    }
}

impl std::fmt::Display for FilesetIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.metalake, self.catalog, self.schema, self.name
        )
    }
}
