//! Maps a package name to the dependency whose archive contains it.
//!
//! Candidates are scanned in manifest order and the first archive holding a
//! compiled class under the package wins; later candidates are not checked.
//! Two archives shipping the same package (shading, split packages) are
//! therefore attributed to whichever comes first.
use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::archive::ArchiveSource;
use crate::error::{DepcovError, Result};
use crate::graph::{DependencyGraph, NodeId};
use crate::model::Coordinate;

/// Where a package's coverage belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Dependency(NodeId),
    Project,
    /// Neither the project nor any dependency ships the package.
    Unresolved,
}

/// Resolves packages against dependency archives, caching archive listings
/// for the lifetime of a run.
pub struct PackageResolver {
    source: Box<dyn ArchiveSource>,
    entries: HashMap<Coordinate, Option<Vec<String>>>,
}

impl PackageResolver {
    pub fn new(source: Box<dyn ArchiveSource>) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    /// Resolve `package` (dotted form) against `candidates`, in order.
    pub fn resolve(
        &mut self,
        package: &str,
        graph: &DependencyGraph,
        candidates: &[NodeId],
        project_packages: &BTreeSet<String>,
    ) -> Result<Target> {
        let prefix = format!("{}/", package.replace('.', "/"));
        let mut matched = None;
        for &id in candidates {
            let coordinate = graph.node(id).coordinate();
            if self.archive_contains(coordinate, &prefix)? {
                matched = Some(id);
                break;
            }
        }

        let in_project = project_packages.contains(package);
        match (matched, in_project) {
            (Some(id), true) => Err(DepcovError::PackageCollision {
                package: package.to_string(),
                dependency: graph.node(id).coordinate().to_string(),
            }),
            (Some(id), false) => Ok(Target::Dependency(id)),
            (None, true) => Ok(Target::Project),
            (None, false) => {
                debug!(package, "package not found in the project or any dependency");
                Ok(Target::Unresolved)
            }
        }
    }

    fn archive_contains(&mut self, coordinate: &Coordinate, prefix: &str) -> Result<bool> {
        if !self.entries.contains_key(coordinate) {
            let listing = self.source.entries(coordinate)?;
            self.entries.insert(coordinate.clone(), listing);
        }
        Ok(self
            .entries
            .get(coordinate)
            .and_then(Option::as_ref)
            .is_some_and(|entries| {
                entries
                    .iter()
                    .any(|e| e.starts_with(prefix) && e.ends_with(".class"))
            }))
    }

    /// Number of archives listed so far.
    pub fn cached_archives(&self) -> usize {
        self.entries.len()
    }

    /// Forget cached archive listings.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
