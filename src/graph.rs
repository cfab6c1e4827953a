//! Dependency DAG built from the resolved manifest.
//!
//! Nodes live in an arena indexed by [`NodeId`]; parent and child links are
//! plain ids, so a dependency shared by several parents is stored once and
//! the graph is torn down as a whole. Every distinct parent chain through
//! which a node is reached contributes one output path:
//!
//!   dependencies/<root>
//!   dependencies/<root>/transitive/<child>
//!   dependencies/<root>/transitive/<child>/transitive/<grandchild>
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::error::{DepcovError, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::model::{Coordinate, CoverageUsage, Scope};

/// Maximum manifest nesting depth. Deeper chains are treated as malformed.
const MAX_DEPTH: usize = 256;

/// Index of a node in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// One location a node's coverage view is rendered at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    pub path: String,
    /// The parent this path runs through; `None` for the root path.
    pub parent: Option<NodeId>,
}

/// A resolved dependency.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    id: NodeId,
    coordinate: Coordinate,
    scope: Scope,
    is_root: bool,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
    output_paths: Vec<OutputPath>,
    pub(crate) own_usage: CoverageUsage,
    pub(crate) package_usage: BTreeMap<String, CoverageUsage>,
    pub(crate) aggregate_usage: Option<CoverageUsage>,
    pub(crate) emitted: HashSet<String>,
}

impl DependencyNode {
    fn new(id: NodeId, coordinate: Coordinate, scope: Scope) -> Self {
        Self {
            id,
            coordinate,
            scope,
            is_root: false,
            parents: Vec::new(),
            children: Vec::new(),
            output_paths: Vec::new(),
            own_usage: CoverageUsage::default(),
            package_usage: BTreeMap::new(),
            aggregate_usage: None,
            emitted: HashSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// True when the manifest lists this node as a direct project dependency.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn output_paths(&self) -> &[OutputPath] {
        &self.output_paths
    }

    /// Coverage attributed directly to packages of this dependency.
    pub fn own_usage(&self) -> &CoverageUsage {
        &self.own_usage
    }

    /// Per-package breakdown of `own_usage`.
    pub fn package_usage(&self) -> &BTreeMap<String, CoverageUsage> {
        &self.package_usage
    }

    /// Memoized subtree total, if it has been computed.
    pub fn aggregate_usage(&self) -> Option<&CoverageUsage> {
        self.aggregate_usage.as_ref()
    }

    pub fn dir_name(&self) -> String {
        self.coordinate.dir_name()
    }
}

/// Construction switches.
#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Prune `test`-scoped dependencies. `provided` is always pruned.
    pub skip_test_dependencies: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            skip_test_dependencies: true,
        }
    }
}

impl GraphOptions {
    fn prunes(&self, scope: Scope) -> bool {
        scope == Scope::Provided || (self.skip_test_dependencies && scope == Scope::Test)
    }
}

/// Arena-backed dependency DAG.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    index: HashMap<Coordinate, NodeId>,
    roots: Vec<NodeId>,
    pruned: HashSet<Coordinate>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a parsed manifest.
    ///
    /// Each coordinate gets exactly one node. Re-encountering a coordinate
    /// links the existing node under the new parent and fans its output
    /// paths out to the new chain.
    pub fn from_manifest(manifest: &Manifest, options: &GraphOptions) -> Result<Self> {
        let mut graph = Self::new();
        for entry in &manifest.dependencies {
            graph.visit(entry, None, options, 0)?;
        }
        debug!(
            nodes = graph.nodes.len(),
            roots = graph.roots.len(),
            pruned = graph.pruned.len(),
            "built dependency graph"
        );
        Ok(graph)
    }

    fn visit(
        &mut self,
        entry: &ManifestEntry,
        parent: Option<NodeId>,
        options: &GraphOptions,
        depth: usize,
    ) -> Result<Option<NodeId>> {
        let coordinate = entry.coordinate()?;
        if depth >= MAX_DEPTH {
            return Err(DepcovError::MalformedManifest(format!(
                "dependency chain deeper than {MAX_DEPTH} at '{coordinate}'"
            )));
        }

        if options.prunes(entry.scope) {
            debug!(dependency = %coordinate, scope = %entry.scope, "pruning dependency");
            self.prune(coordinate);
            return Ok(None);
        }

        // Top-level entries may name their parent explicitly.
        let parent = match parent {
            Some(p) => Some(p),
            None => match entry.parent_coordinate()? {
                None => None,
                Some(declared) => match self.index.get(&declared) {
                    Some(&p) => Some(p),
                    None if self.pruned.contains(&declared) => {
                        debug!(dependency = %coordinate, parent = %declared, "parent was pruned");
                        self.prune(coordinate);
                        return Ok(None);
                    }
                    None => {
                        return Err(DepcovError::DanglingParent {
                            child: coordinate.to_string(),
                            parent: declared.to_string(),
                        })
                    }
                },
            },
        };

        let id = self.add_dependency(coordinate, entry.scope);
        match parent {
            Some(p) => self.link(p, id)?,
            None => self.mark_root(id),
        }

        for child in &entry.children {
            self.visit(child, Some(id), options, depth + 1)?;
        }
        Ok(Some(id))
    }

    /// Return the node for `coordinate`, creating it on first sight.
    pub fn add_dependency(&mut self, coordinate: Coordinate, scope: Scope) -> NodeId {
        if let Some(&id) = self.index.get(&coordinate) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.pruned.remove(&coordinate);
        self.index.insert(coordinate.clone(), id);
        self.nodes.push(DependencyNode::new(id, coordinate, scope));
        id
    }

    /// Record a pruned coordinate. One that also has a node through another
    /// path is not pruned.
    fn prune(&mut self, coordinate: Coordinate) {
        if !self.index.contains_key(&coordinate) {
            self.pruned.insert(coordinate);
        }
    }

    /// Mark a node as a direct project dependency.
    pub fn mark_root(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        if !node.is_root {
            node.is_root = true;
            self.roots.push(id);
        }
        let path = format!("dependencies/{}", self.nodes[id.0].dir_name());
        self.add_output_path(id, path, None);
    }

    /// Link `child` under `parent`. Repeated links are no-ops.
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if parent == child || self.reaches(child, parent) {
            return Err(DepcovError::DependencyCycle {
                parent: self.nodes[parent.0].coordinate.to_string(),
                child: self.nodes[child.0].coordinate.to_string(),
            });
        }
        if !self.nodes[parent.0].children.contains(&child) {
            self.nodes[parent.0].children.push(child);
        }
        if !self.nodes[child.0].parents.contains(&parent) {
            self.nodes[child.0].parents.push(parent);
        }

        let child_dir = self.nodes[child.0].dir_name();
        let parent_paths: Vec<String> = self.nodes[parent.0]
            .output_paths
            .iter()
            .map(|p| p.path.clone())
            .collect();
        for path in parent_paths {
            self.add_output_path(child, format!("{path}/transitive/{child_dir}"), Some(parent));
        }
        Ok(())
    }

    /// Record a new output path and fan it out to every descendant.
    fn add_output_path(&mut self, id: NodeId, path: String, parent: Option<NodeId>) {
        let mut queue = VecDeque::from([(id, path, parent)]);
        while let Some((id, path, parent)) = queue.pop_front() {
            let node = &mut self.nodes[id.0];
            if node.output_paths.iter().any(|p| p.path == path) {
                continue;
            }
            node.output_paths.push(OutputPath {
                path: path.clone(),
                parent,
            });
            for &child in &self.nodes[id.0].children {
                let dir = self.nodes[child.0].dir_name();
                queue.push_back((child, format!("{path}/transitive/{dir}"), Some(id)));
            }
        }
    }

    /// True if `to` is reachable from `from` along child links.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.nodes[id.0].children.iter().copied());
            }
        }
        false
    }

    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut DependencyNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<NodeId> {
        self.index.get(coordinate).copied()
    }

    /// Nodes in first-encounter (manifest) order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.iter()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn pruned_count(&self) -> usize {
        self.pruned.len()
    }

    /// Drop memoized aggregates of `id` and every ancestor.
    pub(crate) fn invalidate_upwards(&mut self, id: NodeId) {
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = &mut self.nodes[id.0];
            node.aggregate_usage = None;
            stack.extend(node.parents.iter().copied());
        }
    }

    /// Forget all attributed usage, memoized totals and emission state
    /// while keeping the structure.
    pub fn clear_usage(&mut self) {
        for node in &mut self.nodes {
            node.own_usage = CoverageUsage::default();
            node.package_usage.clear();
            node.aggregate_usage = None;
            node.emitted.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(a: &str) -> Coordinate {
        Coordinate::new("g", a, "1")
    }

    fn paths(graph: &DependencyGraph, a: &str) -> Vec<String> {
        let id = graph.get(&coord(a)).unwrap();
        graph
            .node(id)
            .output_paths()
            .iter()
            .map(|p| p.path.clone())
            .collect()
    }

    fn manifest(json: &str) -> Manifest {
        Manifest::from_slice(json.as_bytes()).unwrap()
    }

    const DIAMOND: &str = r#"{"dependencies":[
        {"id":"g:r:1","children":[
            {"id":"g:a:1","children":[{"id":"g:c:1"}]},
            {"id":"g:b:1","children":[{"id":"g:c:1"}]}
        ]}
    ]}"#;

    #[test]
    fn test_diamond_shares_single_node() {
        let graph = DependencyGraph::from_manifest(&manifest(DIAMOND), &GraphOptions::default())
            .unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.roots().len(), 1);

        let c = graph.node(graph.get(&coord("c")).unwrap());
        assert_eq!(c.parents().len(), 2);
        assert!(!c.is_root());
        assert_eq!(
            paths(&graph, "c"),
            vec![
                "dependencies/g.r-v1/transitive/g.a-v1/transitive/g.c-v1",
                "dependencies/g.r-v1/transitive/g.b-v1/transitive/g.c-v1",
            ]
        );
        assert_eq!(c.output_paths()[0].parent, graph.get(&coord("a")));
    }

    #[test]
    fn test_root_output_path() {
        let graph = DependencyGraph::from_manifest(&manifest(DIAMOND), &GraphOptions::default())
            .unwrap();
        assert_eq!(paths(&graph, "r"), vec!["dependencies/g.r-v1"]);
        let r = graph.node(graph.get(&coord("r")).unwrap());
        assert!(r.is_root());
        assert_eq!(r.output_paths()[0].parent, None);
    }

    #[test]
    fn test_reattached_node_fans_paths_to_descendants() {
        // a (with child c) is first seen under r1, later repeated under r2
        // without its children listed again.
        let json = r#"{"dependencies":[
            {"id":"g:r1:1","children":[{"id":"g:a:1","children":[{"id":"g:c:1"}]}]},
            {"id":"g:r2:1","children":[{"id":"g:a:1"}]}
        ]}"#;
        let graph =
            DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default()).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(
            paths(&graph, "c"),
            vec![
                "dependencies/g.r1-v1/transitive/g.a-v1/transitive/g.c-v1",
                "dependencies/g.r2-v1/transitive/g.a-v1/transitive/g.c-v1",
            ]
        );
    }

    #[test]
    fn test_node_both_root_and_transitive() {
        let json = r#"{"dependencies":[
            {"id":"g:r:1","children":[{"id":"g:a:1"}]},
            {"id":"g:a:1"}
        ]}"#;
        let graph =
            DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default()).unwrap();
        let a = graph.node(graph.get(&coord("a")).unwrap());
        assert!(a.is_root());
        assert_eq!(graph.roots().len(), 2);
        assert_eq!(
            paths(&graph, "a"),
            vec!["dependencies/g.r-v1/transitive/g.a-v1", "dependencies/g.a-v1"]
        );
    }

    #[test]
    fn test_prunes_provided_and_test_scopes() {
        let json = r#"{"dependencies":[
            {"id":"g:r:1","children":[
                {"id":"g:p:1","scope":"provided","children":[{"id":"g:x:1"}]}
            ]},
            {"id":"g:t:1","scope":"test"}
        ]}"#;
        let graph =
            DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default()).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.get(&coord("p")).is_none());
        assert!(graph.get(&coord("x")).is_none());
        assert!(graph.get(&coord("t")).is_none());
        assert_eq!(graph.pruned_count(), 2);
        assert!(graph.node(graph.roots()[0]).children().is_empty());
    }

    #[test]
    fn test_pruned_then_kept_counts_once() {
        // t is test-scoped under r1, then pulled in at compile scope by r2.
        let json = r#"{"dependencies":[
            {"id":"g:r1:1","children":[{"id":"g:t:1","scope":"test"}]},
            {"id":"g:r2:1","children":[{"id":"g:t:1"}]},
            {"id":"g:r3:1","children":[{"id":"g:t:1","scope":"test"}]}
        ]}"#;
        let graph =
            DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default()).unwrap();
        assert_eq!(graph.len(), 4);
        assert!(graph.get(&coord("t")).is_some());
        assert_eq!(graph.pruned_count(), 0);
        assert_eq!(paths(&graph, "t"), vec!["dependencies/g.r2-v1/transitive/g.t-v1"]);
    }

    #[test]
    fn test_keeps_test_scope_when_configured() {
        let json = r#"{"dependencies":[{"id":"g:t:1","scope":"test"}]}"#;
        let options = GraphOptions {
            skip_test_dependencies: false,
        };
        let graph = DependencyGraph::from_manifest(&manifest(json), &options).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(graph.roots()[0]).scope(), Scope::Test);
    }

    #[test]
    fn test_declared_parent_attaches() {
        let json = r#"{"dependencies":[
            {"id":"g:r:1"},
            {"id":"g:c:1","parent":"g:r:1"}
        ]}"#;
        let graph =
            DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default()).unwrap();
        assert_eq!(graph.roots().len(), 1);
        assert_eq!(paths(&graph, "c"), vec!["dependencies/g.r-v1/transitive/g.c-v1"]);
    }

    #[test]
    fn test_dangling_parent_is_fatal() {
        let json = r#"{"dependencies":[{"id":"g:c:1","parent":"g:missing:1"}]}"#;
        let err = DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default())
            .unwrap_err();
        match err {
            DepcovError::DanglingParent { child, parent } => {
                assert_eq!(child, "g:c:1");
                assert_eq!(parent, "g:missing:1");
            }
            other => panic!("expected DanglingParent, got {other:?}"),
        }
    }

    #[test]
    fn test_child_of_pruned_parent_is_pruned() {
        let json = r#"{"dependencies":[
            {"id":"g:t:1","scope":"test"},
            {"id":"g:c:1","parent":"g:t:1"}
        ]}"#;
        let graph =
            DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default()).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_cycle_is_fatal() {
        let json = r#"{"dependencies":[
            {"id":"g:a:1","children":[{"id":"g:b:1","children":[{"id":"g:a:1"}]}]}
        ]}"#;
        let err = DependencyGraph::from_manifest(&manifest(json), &GraphOptions::default())
            .unwrap_err();
        assert!(matches!(err, DepcovError::DependencyCycle { .. }));
    }

    #[test]
    fn test_invalidate_upwards_clears_ancestors_only() {
        let mut graph =
            DependencyGraph::from_manifest(&manifest(DIAMOND), &GraphOptions::default())
                .unwrap();
        let ids: Vec<NodeId> = graph.nodes().map(|n| n.id()).collect();
        for &id in &ids {
            graph.node_mut(id).aggregate_usage = Some(CoverageUsage::default());
        }
        let a = graph.get(&coord("a")).unwrap();
        graph.invalidate_upwards(a);
        assert!(graph.node(a).aggregate_usage().is_none());
        assert!(graph.node(graph.get(&coord("r")).unwrap()).aggregate_usage().is_none());
        assert!(graph.node(graph.get(&coord("b")).unwrap()).aggregate_usage().is_some());
        assert!(graph.node(graph.get(&coord("c")).unwrap()).aggregate_usage().is_some());
    }
}
