//! Dependency graph management using petgraph.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::package::Package;

/// Directed graph of package dependencies.
///
/// An edge runs from a package to each of its in-repo dependencies. Declared
/// dependency names that do not resolve to another package in the same run
/// are ignored; they produce no edge and no error. The graph may contain
/// cycles; cycle handling is the scheduler's concern.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    packages: HashMap<NodeIndex, Package>,
}

impl DependencyGraph {
    /// Builds a graph from a list of packages. Infallible: unresolvable
    /// dependencies are skipped and duplicate edges are collapsed.
    pub fn new(packages: Vec<Package>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let mut packages_map = HashMap::new();

        for package in &packages {
            let node = graph.add_node(package.name.clone());
            node_map.insert(package.name.clone(), node);
        }

        for package in packages {
            let from = node_map[&package.name];
            for dep_name in &package.deps {
                if let Some(&to) = node_map.get(dep_name) {
                    graph.update_edge(from, to, ());
                }
            }
            packages_map.insert(from, package);
        }

        Self {
            graph,
            node_map,
            packages: packages_map,
        }
    }

    /// Retrieves a package by name.
    #[inline]
    pub fn get_package(&self, name: &str) -> Option<&Package> {
        self.node_map
            .get(name)
            .and_then(|idx| self.packages.get(idx))
    }

    /// Direct in-repo dependencies of a package. Empty for unknown names.
    pub fn dependencies(&self, package_name: &str) -> Vec<String> {
        self.neighbors(package_name, Direction::Outgoing)
    }

    /// Direct dependents of a package (packages that depend on it).
    pub fn dependents(&self, package_name: &str) -> Vec<String> {
        self.neighbors(package_name, Direction::Incoming)
    }

    fn neighbors(&self, package_name: &str, direction: Direction) -> Vec<String> {
        let Some(&node) = self.node_map.get(package_name) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(node, direction)
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// All package names, sorted.
    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.node_map.keys().cloned().collect();
        names.sort();
        names
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub(crate) fn inner(&self) -> &DiGraph<String, ()> {
        &self.graph
    }
}
