//! Command handler functions for the depcov CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{self, Overrides, RunConfig};
use crate::context::RunContext;
use crate::extract::Format;
use crate::graph::{DependencyGraph, GraphOptions};
use crate::manifest::Manifest;
use crate::report::Style;

/// Build the run configuration from an explicit config file, or one
/// discovered in the current directory, plus command-line overrides.
pub fn load_run_config(
    manifest: PathBuf,
    config_path: Option<&Path>,
    overrides: Overrides,
) -> Result<RunConfig> {
    let file = match config_path {
        Some(path) => Some(config::load_config_from_path(path)?),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            config::discover_config(&cwd)?
        }
    };
    Ok(RunConfig::resolve(manifest, file, overrides)?)
}

pub fn cmd_attribute(config: &RunConfig, report: &Path, format: Option<Format>) -> Result<String> {
    let mut ctx = RunContext::from_config(config)
        .with_context(|| format!("Failed to load {}", config.manifest.display()))?;
    let result = ctx
        .run(report, format)
        .with_context(|| format!("Failed to attribute {}", report.display()))?;
    Ok(result.format(config.style.formatter()))
}

/// Run the XML pass and then the HTML pass over one context.
pub fn cmd_combined(config: &RunConfig, xml_report: &Path, html_report: &Path) -> Result<String> {
    let mut ctx = RunContext::from_config(config)
        .with_context(|| format!("Failed to load {}", config.manifest.display()))?;

    let mut outputs = Vec::new();
    for (report, format) in [(xml_report, Format::Xml), (html_report, Format::Html)] {
        let result = ctx
            .run(report, Some(format))
            .with_context(|| format!("Failed to attribute {}", report.display()))?;
        outputs.push(result.format(config.style.formatter()));
    }

    if config.style == Style::Json {
        return Ok(format!("[{}]\n", outputs.join(",")));
    }
    let mut out = String::new();
    for (label, body) in ["xml", "html"].iter().zip(&outputs) {
        writeln!(out, "== {label} pass ==").unwrap();
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}

pub fn cmd_graph(manifest: &Path, options: &GraphOptions) -> Result<String> {
    let parsed = Manifest::from_path(manifest)
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    let graph = DependencyGraph::from_manifest(&parsed, options)?;

    if graph.is_empty() {
        return Ok("No dependencies in the manifest.\n".to_string());
    }

    let mut out = String::new();
    for node in graph.nodes() {
        let direct = if node.is_root() { ", direct" } else { "" };
        writeln!(out, "{} ({}{direct})", node.coordinate(), node.scope()).unwrap();
        for path in node.output_paths() {
            writeln!(out, "  {}", path.path).unwrap();
        }
    }
    writeln!(
        out,
        "\n{} dependencies ({} direct, {} pruned)",
        graph.len(),
        graph.roots().len(),
        graph.pruned_count()
    )
    .unwrap();
    Ok(out)
}
