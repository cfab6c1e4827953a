//! Run-scoped state for attribution passes.
//!
//! A [`RunContext`] owns the dependency graph, the resolver with its archive
//! cache, and the aggregator. Every pass starts by resetting that state, so
//! several passes (an XML report, then an HTML one) can share one context
//! without earlier numbers leaking into later ones.
use std::collections::BTreeSet;
use std::path::Path;

use tracing::info;

use crate::aggregate::Aggregator;
use crate::archive::{scan_project_packages, ArchiveSource, LocalRepository};
use crate::config::RunConfig;
use crate::error::Result;
use crate::extract::{self, Format};
use crate::graph::{DependencyGraph, GraphOptions};
use crate::manifest::Manifest;
use crate::report::{AttributedPackage, RunReport};
use crate::resolver::{PackageResolver, Target};

pub struct RunContext {
    graph: DependencyGraph,
    resolver: PackageResolver,
    aggregator: Aggregator,
}

impl RunContext {
    pub fn new(
        manifest: &Manifest,
        options: &GraphOptions,
        archives: Box<dyn ArchiveSource>,
        project_packages: BTreeSet<String>,
    ) -> Result<Self> {
        let graph = DependencyGraph::from_manifest(manifest, options)?;
        info!(
            entries = manifest.entry_count(),
            dependencies = graph.len(),
            direct = graph.roots().len(),
            pruned = graph.pruned_count(),
            "built dependency graph"
        );
        let aggregator = Aggregator::new(&graph, project_packages);
        Ok(Self {
            graph,
            resolver: PackageResolver::new(archives),
            aggregator,
        })
    }

    /// Load the manifest, open the local repository and collect project
    /// packages as configured.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let manifest = Manifest::from_path(&config.manifest)?;
        let mut project_packages = config.project_packages.clone();
        for dir in &config.project_classes {
            project_packages.extend(scan_project_packages(dir)?);
        }
        info!(
            repository = %config.local_repo.display(),
            project_packages = project_packages.len(),
            "loaded run configuration"
        );
        Self::new(
            &manifest,
            &config.graph_options(),
            Box::new(LocalRepository::new(&config.local_repo)),
            project_packages,
        )
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Drop everything a previous pass attributed, memoized or emitted,
    /// along with cached archive listings.
    pub fn reset(&mut self) {
        self.graph.clear_usage();
        self.resolver.reset();
        self.aggregator.clear();
    }

    /// Run one full pass over `report`: extract, attribute, aggregate and
    /// emit every node view into a [`RunReport`].
    pub fn run(&mut self, report: &Path, format: Option<Format>) -> Result<RunReport> {
        self.reset();

        let (format, extraction) = extract::extract_file(report, format)?;
        self.aggregator.attribute_all(
            &mut self.graph,
            &mut self.resolver,
            extraction.packages,
        )?;

        let mut out = RunReport::new(report.display().to_string(), format);
        Aggregator::emit_all(&mut self.graph, &mut |view| out.insert_view(view))?;

        out.dependencies = self.graph.len();
        out.pruned = self.graph.pruned_count();
        out.grand_total = Aggregator::grand_total(&self.graph, self.graph.roots());
        out.project = *self.aggregator.project_usage();
        out.overall_total = self.aggregator.overall_total(&self.graph);
        out.report_total = extraction.total;
        out.attribution = self
            .aggregator
            .attribution()
            .iter()
            .map(|(package, target)| AttributedPackage {
                package: package.clone(),
                owner: match target {
                    Target::Dependency(id) => self.graph.node(*id).coordinate().to_string(),
                    Target::Project => "project".to_string(),
                    Target::Unresolved => "unresolved".to_string(),
                },
            })
            .collect();

        info!(
            report = %report.display(),
            views = out.views.len(),
            archives = self.resolver.cached_archives(),
            instructions_total = out.overall_total.instructions.total,
            instructions_covered = out.overall_total.instructions.covered(),
            "attribution pass finished"
        );
        Ok(out)
    }
}
