//! Run configuration: CLI flags layered over an optional `.depcov.json`.
//!
//! ```json
//! {
//!   "local_repo": "/home/ci/.m2/repository",
//!   "project_packages": ["com.example.app"],
//!   "include_test_dependencies": false,
//!   "style": "markdown"
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::archive::LocalRepository;
use crate::error::{DepcovError, Result};
use crate::graph::GraphOptions;
use crate::report::Style;

pub const CONFIG_FILENAME: &str = ".depcov.json";

/// Optional on-disk defaults.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub local_repo: Option<PathBuf>,
    pub project_packages: Option<Vec<String>>,
    pub project_classes: Option<Vec<PathBuf>>,
    pub include_test_dependencies: Option<bool>,
    pub style: Option<Style>,
    /// Captures unknown fields for warnings.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

/// Load config from an explicit path.
pub fn load_config_from_path(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DepcovError::Config(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    let config: ConfigFile = serde_json::from_str(&content).map_err(|e| {
        DepcovError::Config(format!(
            "failed to parse config file {}: {e}",
            path.display()
        ))
    })?;

    validate_config(&config)?;
    warn_unknown_fields(&config);
    Ok(config)
}

/// Look for [`CONFIG_FILENAME`] in `dir`. Returns `None` if absent.
pub fn discover_config(dir: &Path) -> Result<Option<ConfigFile>> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    load_config_from_path(&path).map(Some)
}

fn validate_config(config: &ConfigFile) -> Result<()> {
    if let Some(packages) = &config.project_packages {
        validate_packages(packages.iter().map(String::as_str))?;
    }
    Ok(())
}

fn validate_packages<'a>(packages: impl IntoIterator<Item = &'a str>) -> Result<()> {
    for (i, name) in packages.into_iter().enumerate() {
        if name.trim().is_empty() {
            return Err(DepcovError::Config(format!(
                "project_packages[{i}] must not be empty"
            )));
        }
    }
    Ok(())
}

fn warn_unknown_fields(config: &ConfigFile) {
    for key in config.unknown_fields.keys() {
        warn!(field = key.as_str(), "unknown config field will be ignored");
    }
}

/// Fully resolved settings for one attribution run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub manifest: PathBuf,
    pub local_repo: PathBuf,
    /// Compiled-classes directories scanned for project packages.
    pub project_classes: Vec<PathBuf>,
    /// Project packages named explicitly.
    pub project_packages: BTreeSet<String>,
    pub skip_test_dependencies: bool,
    pub style: Style,
}

/// Values given on the command line; `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub local_repo: Option<PathBuf>,
    pub project_classes: Vec<PathBuf>,
    pub project_packages: Vec<String>,
    pub include_test_dependencies: bool,
    pub style: Option<Style>,
}

impl RunConfig {
    /// Layer CLI overrides over the config file, falling back to defaults.
    pub fn resolve(manifest: PathBuf, file: Option<ConfigFile>, cli: Overrides) -> Result<Self> {
        let file = file.unwrap_or_default();
        validate_packages(cli.project_packages.iter().map(String::as_str))?;

        let local_repo = cli
            .local_repo
            .or(file.local_repo)
            .or_else(LocalRepository::default_location)
            .ok_or_else(|| {
                DepcovError::Config(
                    "no local repository given and HOME is not set".to_string(),
                )
            })?;

        let mut project_packages: BTreeSet<String> =
            file.project_packages.unwrap_or_default().into_iter().collect();
        project_packages.extend(cli.project_packages);

        let project_classes = if cli.project_classes.is_empty() {
            file.project_classes.unwrap_or_default()
        } else {
            cli.project_classes
        };

        let include_test = cli.include_test_dependencies
            || file.include_test_dependencies.unwrap_or(false);

        Ok(Self {
            manifest,
            local_repo,
            project_classes,
            project_packages,
            skip_test_dependencies: !include_test,
            style: cli.style.or(file.style).unwrap_or_default(),
        })
    }

    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            skip_test_dependencies: self.skip_test_dependencies,
        }
    }
}
