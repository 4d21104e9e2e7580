//! Cycle detection via strongly-connected-component decomposition.

use std::collections::HashSet;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::graph::DependencyGraph;

/// A closed walk of mutually dependent package names; first == last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    names: Vec<String>,
}

impl Cycle {
    /// Renders the walk as `A -> B -> A`.
    pub fn path(&self) -> String {
        self.names.join(" -> ")
    }

    /// Packages on the walk, including the repeated seed.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Finds every cycle in the graph, one per cyclic strongly-connected
/// component. A component of size 1 counts only if it has a self-loop.
///
/// Each component is unrolled into a single closed walk seeded at its
/// lexicographically lowest member, with neighbors visited in sorted order,
/// so the reported paths are stable across runs for identical input.
/// Detection is a side effect only; it never halts processing by itself.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Cycle> {
    let inner = graph.inner();
    let mut cycles = Vec::new();

    for component in tarjan_scc(inner) {
        if component.len() == 1 {
            let node = component[0];
            if inner.find_edge(node, node).is_some() {
                let name = inner[node].clone();
                cycles.push(Cycle {
                    names: vec![name.clone(), name],
                });
            }
            continue;
        }

        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        let Some(seed) = component
            .iter()
            .copied()
            .min_by(|a, b| inner[*a].cmp(&inner[*b]))
        else {
            continue;
        };

        if let Some(walk) = close_walk(inner, &members, seed) {
            cycles.push(Cycle { names: walk });
        }
    }

    cycles.sort_by(|a, b| a.names.cmp(&b.names));
    cycles
}

/// Walks edges inside the component from the seed until the walk returns to
/// the seed. The seed sorts lowest in the component, so the closing edge is
/// always preferred as soon as it is reachable.
fn close_walk(
    graph: &DiGraph<String, ()>,
    members: &HashSet<NodeIndex>,
    seed: NodeIndex,
) -> Option<Vec<String>> {
    let mut path = vec![seed];
    let mut visited = HashSet::from([seed]);

    if !step(graph, members, seed, seed, &mut path, &mut visited) {
        return None;
    }

    Some(path.into_iter().map(|idx| graph[idx].clone()).collect())
}

fn step(
    graph: &DiGraph<String, ()>,
    members: &HashSet<NodeIndex>,
    seed: NodeIndex,
    current: NodeIndex,
    path: &mut Vec<NodeIndex>,
    visited: &mut HashSet<NodeIndex>,
) -> bool {
    let mut neighbors: Vec<NodeIndex> = graph
        .neighbors(current)
        .filter(|n| members.contains(n))
        .collect();
    neighbors.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
    neighbors.dedup();

    for next in neighbors {
        if next == seed {
            path.push(seed);
            return true;
        }
        if visited.insert(next) {
            path.push(next);
            if step(graph, members, seed, next, path, visited) {
                return true;
            }
            path.pop();
        }
    }

    false
}
