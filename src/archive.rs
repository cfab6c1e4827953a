//! Access to dependency archives and to the project's own compiled classes.
//!
//! Archives are looked up by coordinate in a Maven-layout local repository:
//!   <root>/<group as path>/<artifact>/<version>/<artifact>-<version>.jar
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DepcovError, Result};
use crate::model::Coordinate;

/// Anything that can list the entries of a dependency's archive.
pub trait ArchiveSource {
    /// Entry paths of the archive for `coordinate`, or `None` when the
    /// dependency has no archive (e.g. a pom-only artifact).
    fn entries(&self, coordinate: &Coordinate) -> Result<Option<Vec<String>>>;
}

/// Jar files in a local Maven repository.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.m2/repository`, if `HOME` is set.
    pub fn default_location() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".m2").join("repository"))
    }

    pub fn jar_path(&self, coordinate: &Coordinate) -> PathBuf {
        let mut path = self.root.clone();
        for segment in coordinate.group_id.split('.') {
            path.push(segment);
        }
        path.push(&coordinate.artifact_id);
        path.push(&coordinate.version);
        path.push(format!("{}-{}.jar", coordinate.artifact_id, coordinate.version));
        path
    }
}

impl ArchiveSource for LocalRepository {
    fn entries(&self, coordinate: &Coordinate) -> Result<Option<Vec<String>>> {
        let path = self.jar_path(coordinate);
        if !path.is_file() {
            debug!(dependency = %coordinate, path = %path.display(), "no archive found");
            return Ok(None);
        }
        let archive_err = |source| DepcovError::Archive {
            path: path.display().to_string(),
            source,
        };
        let file = File::open(&path)?;
        let archive = zip::ZipArchive::new(file).map_err(archive_err)?;
        Ok(Some(archive.file_names().map(str::to_owned).collect()))
    }
}

/// Archives held in memory, keyed by coordinate.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchives {
    archives: HashMap<Coordinate, Vec<String>>,
}

impl InMemoryArchives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, coordinate: Coordinate, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.archives
            .insert(coordinate, entries.into_iter().map(Into::into).collect());
    }

    pub fn with<I, S>(mut self, coordinate: Coordinate, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(coordinate, entries);
        self
    }
}

impl ArchiveSource for InMemoryArchives {
    fn entries(&self, coordinate: &Coordinate) -> Result<Option<Vec<String>>> {
        Ok(self.archives.get(coordinate).cloned())
    }
}

/// Collect the dotted package names of every `.class` file below
/// `classes_dir` (typically `target/classes`). Classes in the default
/// package are ignored.
pub fn scan_project_packages(classes_dir: &Path) -> Result<BTreeSet<String>> {
    let mut packages = BTreeSet::new();
    let mut stack = vec![classes_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("class") {
                continue;
            }
            let Some(parent) = path.parent() else { continue };
            let Ok(relative) = parent.strip_prefix(classes_dir) else {
                continue;
            };
            let package = relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect::<Vec<_>>()
                .join(".");
            if !package.is_empty() {
                packages.insert(package);
            }
        }
    }
    Ok(packages)
}
