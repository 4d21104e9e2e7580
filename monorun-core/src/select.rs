//! Working-set selection applied to a scheduled batch sequence.

use crate::graph::DependencyGraph;
use crate::package::Package;
use crate::schedule::Batch;

/// Removes excluded packages from every batch, preserving batch order and
/// the relative membership of the remaining packages. Batches that become
/// empty are dropped from the sequence.
///
/// Selection never rewires edges; Kahn ordering is monotonic under subset
/// removal, so ordering guarantees among the remaining packages still hold.
pub fn apply_filter<F>(graph: &DependencyGraph, batches: &[Batch], predicate: F) -> Vec<Batch>
where
    F: Fn(&Package) -> bool,
{
    batches
        .iter()
        .map(|batch| {
            batch
                .iter()
                .filter(|name| graph.get_package(name).is_some_and(&predicate))
                .cloned()
                .collect::<Batch>()
        })
        .filter(|batch| !batch.is_empty())
        .collect()
}
