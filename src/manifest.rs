//! Serde model of the resolved dependency lockfile.
//!
//! The lockfile is a JSON document with a top-level `dependencies` array.
//! Every entry nests its direct children; a dependency reachable through
//! several parents appears once under each of them.
//!
//! ```json
//! { "dependencies": [
//!     { "id": "org.acme:acme-core:1.2.0", "groupId": "org.acme",
//!       "artifactId": "acme-core", "selectedVersion": "1.2.0",
//!       "scope": "compile", "children": [ ... ] } ] }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{DepcovError, Result};
use crate::model::{Coordinate, Scope};

/// The parsed lockfile.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub dependencies: Vec<ManifestEntry>,
}

/// One dependency entry together with its nested children.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default, alias = "version")]
    pub selected_version: Option<String>,
    #[serde(default = "default_scope")]
    pub scope: Scope,
    /// Declared parent id. Only consulted for top-level entries; nested
    /// entries take their parent from the enclosing entry.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<ManifestEntry>,
}

fn default_scope() -> Scope {
    Scope::Compile
}

impl Manifest {
    /// Read and parse a lockfile from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        Self::from_slice(&content)
    }

    pub fn from_slice(input: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(input)?)
    }

    /// Number of entries including nested repeats.
    pub fn entry_count(&self) -> usize {
        fn count(entries: &[ManifestEntry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.children)).sum()
        }
        count(&self.dependencies)
    }
}

impl ManifestEntry {
    /// Resolve the coordinate, preferring the explicit group/artifact/version
    /// fields and falling back to the `id` string.
    pub fn coordinate(&self) -> Result<Coordinate> {
        match (&self.group_id, &self.artifact_id, &self.selected_version) {
            (Some(g), Some(a), Some(v)) if !g.is_empty() && !a.is_empty() && !v.is_empty() => {
                Ok(Coordinate::new(g.as_str(), a.as_str(), v.as_str()))
            }
            _ => match &self.id {
                Some(id) => id.parse(),
                None => Err(DepcovError::MalformedManifest(
                    "entry has neither an id nor groupId/artifactId/selectedVersion".to_string(),
                )),
            },
        }
    }

    /// The declared parent coordinate, if any.
    pub fn parent_coordinate(&self) -> Result<Option<Coordinate>> {
        match self.parent.as_deref() {
            None | Some("") => Ok(None),
            Some(p) => p.parse().map(Some),
        }
    }
}
