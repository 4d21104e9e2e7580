use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use monorun_core::error::Error;
use monorun_core::graph::DependencyGraph;
use monorun_core::output::SinkHandle;
use monorun_core::package::Package;
use monorun_core::runner::{RunContext, TaskRunner, TaskStatus};
use monorun_core::schedule::{schedule, Batch, CyclePolicy};
use monorun_core::script::{ScriptInvocation, ScriptOutput, ScriptRunner};

fn make_package(name: &str, deps: Vec<&str>, with_script: bool) -> Package {
    let mut scripts = BTreeMap::new();
    if with_script {
        scripts.insert("build".to_string(), format!("echo {name}"));
    }
    Package::new(
        name.to_string(),
        "1.0.0".to_string(),
        PathBuf::from(name),
        deps.into_iter().map(String::from).collect(),
        scripts,
    )
}

/// Records every invocation instead of spawning children; packages listed
/// in `fail` exit non-zero.
struct FakeRunner {
    log: Arc<Mutex<Vec<String>>>,
    fail: HashSet<String>,
    delay: Duration,
}

impl FakeRunner {
    fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            fail: HashSet::new(),
            delay: Duration::ZERO,
        }
    }

    fn failing(mut self, names: &[&str]) -> Self {
        self.fail = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

impl ScriptRunner for FakeRunner {
    fn run(
        &self,
        package: &Package,
        _invocation: &ScriptInvocation,
        _sink: Option<&SinkHandle>,
    ) -> monorun_core::Result<ScriptOutput> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.log.lock().unwrap().push(package.name.clone());
        let exit_code = if self.fail.contains(&package.name) { 1 } else { 0 };
        Ok(ScriptOutput {
            exit_code,
            stdout: format!("ran {}\n", package.name),
            stderr: String::new(),
        })
    }
}

fn run_with_fake(
    graph: &DependencyGraph,
    batches: &[Batch],
    context: RunContext,
    fake: FakeRunner,
) -> monorun_core::Result<Vec<monorun_core::TaskOutcome>> {
    TaskRunner::new(context)
        .with_script_runner(Arc::new(fake))
        .run(graph, batches)
}

#[test]
fn test_dependency_finishes_before_dependent_starts() {
    let graph = DependencyGraph::new(vec![
        make_package("a", vec![], true),
        make_package("b", vec!["a"], true),
        make_package("c", vec!["b"], true),
    ]);
    let batches = schedule(&graph, CyclePolicy::Warn).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let outcomes = run_with_fake(
        &graph,
        &batches,
        RunContext::new("build").with_concurrency(4),
        FakeRunner::new(Arc::clone(&log)),
    )
    .unwrap();

    assert_eq!(outcomes.len(), 3);
    let order = log.lock().unwrap().clone();
    assert_eq!(order, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

#[test]
fn test_parallel_mode_runs_everything() {
    let graph = DependencyGraph::new(vec![
        make_package("a", vec![], true),
        make_package("b", vec!["a"], true),
        make_package("c", vec!["b"], true),
    ]);
    let batches = schedule(&graph, CyclePolicy::Warn).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let outcomes = run_with_fake(
        &graph,
        &batches,
        RunContext::new("build").with_parallel(true),
        FakeRunner::new(Arc::clone(&log)),
    )
    .unwrap();

    let names: HashSet<String> = outcomes.iter().map(|o| o.package.clone()).collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains("a") && names.contains("b") && names.contains("c"));
}

#[test]
fn test_bail_skips_later_batches() {
    let graph = DependencyGraph::new(vec![
        make_package("p1", vec![], true),
        make_package("p2", vec![], true),
    ]);
    // p2 deliberately scheduled after p1's batch.
    let batches: Vec<Batch> = vec![vec!["p1".to_string()], vec!["p2".to_string()]];

    let log = Arc::new(Mutex::new(Vec::new()));
    let err = run_with_fake(
        &graph,
        &batches,
        RunContext::new("build"),
        FakeRunner::new(Arc::clone(&log)).failing(&["p1"]),
    )
    .unwrap_err();

    match err {
        Error::RunAborted { package, .. } => assert_eq!(package, "p1"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(log.lock().unwrap().clone(), vec!["p1".to_string()]);
}

#[test]
fn test_no_bail_attempts_everything_and_aggregates() {
    let graph = DependencyGraph::new(vec![
        make_package("p1", vec![], true),
        make_package("p2", vec![], true),
    ]);
    let batches: Vec<Batch> = vec![vec!["p1".to_string()], vec!["p2".to_string()]];

    let log = Arc::new(Mutex::new(Vec::new()));
    let err = run_with_fake(
        &graph,
        &batches,
        RunContext::new("build").with_bail(false),
        FakeRunner::new(Arc::clone(&log)).failing(&["p1", "p2"]),
    )
    .unwrap_err();

    match err {
        Error::AggregateFailure { failures } => {
            let mut names: Vec<String> = failures.into_iter().map(|f| f.package).collect();
            names.sort();
            assert_eq!(names, vec!["p1".to_string(), "p2".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn test_missing_script_is_skipped_not_failed() {
    let graph = DependencyGraph::new(vec![
        make_package("a", vec![], true),
        make_package("no-script", vec![], false),
    ]);
    let batches = schedule(&graph, CyclePolicy::Warn).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let outcomes = run_with_fake(
        &graph,
        &batches,
        RunContext::new("build"),
        FakeRunner::new(Arc::clone(&log)),
    )
    .unwrap();

    // The runner is never invoked for the script-less package.
    assert_eq!(log.lock().unwrap().clone(), vec!["a".to_string()]);

    let skipped = outcomes
        .iter()
        .find(|o| o.package == "no-script")
        .unwrap();
    assert_eq!(skipped.status, TaskStatus::Skipped);
    assert!(skipped.stdout.is_empty());
}

#[test]
fn test_failure_within_batch_lets_siblings_finish() {
    // Both packages share a batch; the failing one must not prevent its
    // sibling from being attempted once it is already eligible.
    let graph = DependencyGraph::new(vec![
        make_package("a", vec![], true),
        make_package("b", vec![], true),
    ]);
    let batches: Vec<Batch> = vec![vec!["a".to_string(), "b".to_string()]];

    let log = Arc::new(Mutex::new(Vec::new()));
    let result = run_with_fake(
        &graph,
        &batches,
        RunContext::new("build").with_bail(false),
        FakeRunner::new(Arc::clone(&log)).failing(&["a"]),
    );

    assert!(result.is_err());
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn test_empty_selection_is_a_successful_noop() {
    let graph = DependencyGraph::new(vec![make_package("a", vec![], true)]);
    let outcomes = run_with_fake(
        &graph,
        &[],
        RunContext::new("build"),
        FakeRunner::new(Arc::new(Mutex::new(Vec::new()))),
    )
    .unwrap();

    assert!(outcomes.is_empty());
}
