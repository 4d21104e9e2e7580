//! Batching topological scheduler (Kahn's algorithm).

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::cycles::find_cycles;
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;

/// Packages with no unresolved in-repo dependency remaining; safe to run
/// concurrently. Sorted by name for a deterministic sequence.
pub type Batch = Vec<String>;

/// What to do when the graph is not a DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePolicy {
    /// Warn once with every cycle path, then force progress by scheduling
    /// the lowest-named stuck package into a singleton batch.
    #[default]
    Warn,
    /// Fail with `Error::CyclicDependency` before anything is scheduled.
    Reject,
}

/// Converts the graph into an ordered sequence of batches.
///
/// Each round collects every package whose remaining dependencies have all
/// been scheduled. When no package qualifies but packages remain, the graph
/// is cyclic among them and the cycle policy decides how to proceed.
///
/// Postcondition: concatenating all batches yields exactly the input node
/// set, each package exactly once.
pub fn schedule(graph: &DependencyGraph, policy: CyclePolicy) -> Result<Vec<Batch>> {
    schedule_with_cycle_handler(graph, policy, |paths| {
        warn!("cyclic dependencies detected: {paths}");
    })
}

/// Same as [`schedule`], but cycle warnings are delivered to `on_cycles`
/// instead of the log. The handler fires at most once per run, with every
/// cycle path, no matter how many times the algorithm stalls.
pub fn schedule_with_cycle_handler<F>(
    graph: &DependencyGraph,
    policy: CyclePolicy,
    mut on_cycles: F,
) -> Result<Vec<Batch>>
where
    F: FnMut(&str),
{
    let mut remaining: BTreeSet<String> = graph.package_names().into_iter().collect();

    // Unscheduled in-repo dependency count per package.
    let mut pending: HashMap<String, usize> = remaining
        .iter()
        .map(|name| (name.clone(), graph.dependencies(name).len()))
        .collect();

    let mut batches = Vec::new();
    let mut warned = false;

    while !remaining.is_empty() {
        let mut ready: Batch = remaining
            .iter()
            .filter(|name| pending[*name] == 0)
            .cloned()
            .collect();

        if ready.is_empty() {
            let paths = render_cycle_paths(graph);
            match policy {
                CyclePolicy::Reject => return Err(Error::CyclicDependency(paths)),
                CyclePolicy::Warn => {
                    if !warned {
                        on_cycles(&paths);
                        warned = true;
                    }
                    // Force the lowest-named stuck package through alone.
                    match remaining.iter().next().cloned() {
                        Some(forced) => ready.push(forced),
                        None => break,
                    }
                }
            }
        }

        for name in &ready {
            remaining.remove(name);
        }
        for name in &ready {
            for dependent in graph.dependents(name) {
                if remaining.contains(&dependent) {
                    if let Some(count) = pending.get_mut(&dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        batches.push(ready);
    }

    Ok(batches)
}

fn render_cycle_paths(graph: &DependencyGraph) -> String {
    find_cycles(graph)
        .iter()
        .map(|c| c.path())
        .collect::<Vec<_>>()
        .join(", ")
}
