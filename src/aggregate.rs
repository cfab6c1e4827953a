//! Attribution of extracted package usage to graph nodes, memoized rollup,
//! the de-duplicated grand total and idempotent emission of node views.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::graph::{DependencyGraph, NodeId};
use crate::model::{Coordinate, CoverageUsage, PackageUsage, Scope};
use crate::resolver::{PackageResolver, Target};

/// A node's coverage as seen from one of its output paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub path: String,
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub is_root: bool,
    /// Usage of the node's own packages.
    pub own: CoverageUsage,
    /// Usage contributed by everything below the node.
    pub transitive: CoverageUsage,
    /// `own + transitive`.
    pub aggregate: CoverageUsage,
    /// What the view is measured against: the node's own aggregate on its
    /// root path, the parent's aggregate on a transitive path.
    pub denominator: CoverageUsage,
    pub packages: BTreeMap<String, CoverageUsage>,
}

/// Run-scoped attribution state.
#[derive(Debug, Default)]
pub struct Aggregator {
    /// Dependency nodes in manifest order, the resolver's candidate list.
    candidates: Vec<NodeId>,
    project_packages: BTreeSet<String>,
    project_usage: CoverageUsage,
    project_package_usage: BTreeMap<String, CoverageUsage>,
    attribution: BTreeMap<String, Target>,
}

impl Aggregator {
    pub fn new(graph: &DependencyGraph, project_packages: BTreeSet<String>) -> Self {
        Self {
            candidates: graph.nodes().map(|n| n.id()).collect(),
            project_packages,
            ..Self::default()
        }
    }

    /// Route one extracted package row to its owner.
    pub fn attribute(
        &mut self,
        graph: &mut DependencyGraph,
        resolver: &mut PackageResolver,
        row: PackageUsage,
    ) -> Result<Target> {
        let target = resolver.resolve(
            &row.package,
            graph,
            &self.candidates,
            &self.project_packages,
        )?;
        match target {
            Target::Dependency(id) => {
                let node = graph.node_mut(id);
                node.own_usage += row.usage;
                *node.package_usage.entry(row.package.clone()).or_default() += row.usage;
                graph.invalidate_upwards(id);
            }
            Target::Project => {
                self.project_usage += row.usage;
                *self
                    .project_package_usage
                    .entry(row.package.clone())
                    .or_default() += row.usage;
            }
            Target::Unresolved => {}
        }
        self.attribution.insert(row.package, target);
        Ok(target)
    }

    /// Attribute every row, returning how many landed on a dependency.
    pub fn attribute_all(
        &mut self,
        graph: &mut DependencyGraph,
        resolver: &mut PackageResolver,
        rows: impl IntoIterator<Item = PackageUsage>,
    ) -> Result<usize> {
        let mut attributed = 0;
        let mut unresolved = 0;
        for row in rows {
            match self.attribute(graph, resolver, row)? {
                Target::Dependency(_) => attributed += 1,
                Target::Project => {}
                Target::Unresolved => unresolved += 1,
            }
        }
        info!(
            attributed,
            project = self.project_package_usage.len(),
            unresolved,
            "attributed report packages"
        );
        Ok(attributed)
    }

    /// Memoized subtree total of `id`: its own usage plus the aggregate of
    /// every child. Each node is computed at most once however many parents
    /// reach it; a shared child's total is repeated under every ancestor.
    pub fn aggregate(graph: &mut DependencyGraph, id: NodeId) -> CoverageUsage {
        if let Some(total) = graph.node(id).aggregate_usage {
            return total;
        }

        // Explicit post-order: a node is summed once all its children are.
        let mut stack = vec![(id, false)];
        while let Some((current, children_done)) = stack.pop() {
            if graph.node(current).aggregate_usage.is_some() {
                continue;
            }
            if children_done {
                let node = graph.node(current);
                let mut total = node.own_usage;
                for &child in node.children() {
                    total += graph.node(child).aggregate_usage.unwrap_or_default();
                }
                graph.node_mut(current).aggregate_usage = Some(total);
            } else {
                stack.push((current, true));
                for &child in graph.node(current).children() {
                    if graph.node(child).aggregate_usage.is_none() {
                        stack.push((child, false));
                    }
                }
            }
        }
        graph.node(id).aggregate_usage.unwrap_or_default()
    }

    /// Usage contributed below `id`, excluding its own packages.
    pub fn transitive(graph: &mut DependencyGraph, id: NodeId) -> CoverageUsage {
        let aggregate = Self::aggregate(graph, id);
        aggregate.saturating_sub(graph.node(id).own_usage())
    }

    /// Dependency-wide total counting every node reachable from `roots`
    /// exactly once.
    pub fn grand_total(graph: &DependencyGraph, roots: &[NodeId]) -> CoverageUsage {
        let mut summed = HashSet::new();
        let mut stack: Vec<NodeId> = roots.iter().rev().copied().collect();
        let mut total = CoverageUsage::default();
        while let Some(id) = stack.pop() {
            if !summed.insert(id) {
                continue;
            }
            let node = graph.node(id);
            total += node.own_usage();
            stack.extend(node.children().iter().rev().copied());
        }
        total
    }

    /// Grand total over the graph's roots plus the project's own packages.
    pub fn overall_total(&self, graph: &DependencyGraph) -> CoverageUsage {
        Self::grand_total(graph, graph.roots()) + self.project_usage
    }

    /// Hand each not-yet-emitted output path of `id` to `sink`, once per
    /// path. Returns the number of views emitted by this call.
    pub fn emit(
        graph: &mut DependencyGraph,
        id: NodeId,
        sink: &mut dyn FnMut(NodeView) -> Result<()>,
    ) -> Result<usize> {
        let aggregate = Self::aggregate(graph, id);
        let paths = graph.node(id).output_paths().to_vec();
        let mut emitted = 0;
        for output in paths {
            if graph.node(id).emitted.contains(&output.path) {
                continue;
            }
            let denominator = match output.parent {
                Some(parent) => Self::aggregate(graph, parent),
                None => aggregate,
            };
            let node = graph.node(id);
            let view = NodeView {
                path: output.path.clone(),
                coordinate: node.coordinate().clone(),
                scope: node.scope(),
                is_root: node.is_root(),
                own: *node.own_usage(),
                transitive: aggregate.saturating_sub(node.own_usage()),
                aggregate,
                denominator,
                packages: node.package_usage().clone(),
            };
            sink(view)?;
            graph.node_mut(id).emitted.insert(output.path);
            emitted += 1;
        }
        Ok(emitted)
    }

    /// Emit every node reachable from the roots, parents before children.
    pub fn emit_all(
        graph: &mut DependencyGraph,
        sink: &mut dyn FnMut(NodeView) -> Result<()>,
    ) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = graph.roots().iter().rev().copied().collect();
        let mut emitted = 0;
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            emitted += Self::emit(graph, id, sink)?;
            stack.extend(graph.node(id).children().iter().rev().copied());
        }
        debug!(emitted, "emitted node views");
        Ok(emitted)
    }

    pub fn project_usage(&self) -> &CoverageUsage {
        &self.project_usage
    }

    pub fn project_packages(&self) -> &BTreeSet<String> {
        &self.project_packages
    }

    /// Where each extracted package went.
    pub fn attribution(&self) -> &BTreeMap<String, Target> {
        &self.attribution
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.attribution
            .iter()
            .filter(|(_, t)| **t == Target::Unresolved)
            .map(|(p, _)| p.as_str())
    }

    /// Forget attributed usage, keeping the candidate list and project
    /// packages.
    pub fn clear(&mut self) {
        self.project_usage = CoverageUsage::default();
        self.project_package_usage.clear();
        self.attribution.clear();
    }
}
