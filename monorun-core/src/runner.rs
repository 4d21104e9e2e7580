//! Task execution engine and run-level failure policies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam::channel;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::output::{OutputSink, SinkHandle};
use crate::schedule::Batch;
use crate::script::{ProcessRunner, ScriptInvocation, ScriptRunner};

/// Immutable per-invocation configuration.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Script to run in every selected package.
    pub script: String,
    /// Extra positional arguments forwarded to the script.
    pub args: Vec<String>,
    /// Concurrency cap per batch in topological mode.
    pub concurrency: usize,
    /// Flatten all batches and run everything at once, uncapped.
    pub parallel: bool,
    /// Forward output lines as they arrive instead of buffering per package.
    pub stream: bool,
    /// Prefix streamed lines with `name (client):`.
    pub prefix: bool,
    /// Stop scheduling new tasks after the first failure.
    pub bail: bool,
    /// Script-runner client name, passed through uninterpreted.
    pub client: String,
}

impl RunContext {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            concurrency: rayon::current_num_threads(),
            parallel: false,
            stream: false,
            prefix: true,
            bail: true,
            client: "npm".to_string(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_prefix(mut self, prefix: bool) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }
}

/// Per-package result of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    Failed { message: String },
    /// The package declares no such script. Not a failure.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub package: String,
    pub status: TaskStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl TaskOutcome {
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self.status, TaskStatus::Failed { .. })
    }
}

/// One failed task, as aggregated under the no-bail policy.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub package: String,
    pub message: String,
}

/// Runs the target script for every package in a scheduled batch sequence.
pub struct TaskRunner {
    context: RunContext,
    runner: Arc<dyn ScriptRunner>,
}

impl TaskRunner {
    pub fn new(context: RunContext) -> Self {
        Self {
            context,
            runner: Arc::new(ProcessRunner),
        }
    }

    /// Swaps the script-runner implementation; tests use a recording fake.
    pub fn with_script_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Executes every batch in order, up to `concurrency` tasks at a time
    /// within a batch; batch *k+1* starts only after batch *k* has drained.
    /// Parallel mode flattens the sequence and runs everything at once.
    ///
    /// # Errors
    ///
    /// `Error::RunAborted` for the first failure under bail, or
    /// `Error::AggregateFailure` listing every failure otherwise. A package
    /// lacking the script is skipped and never counts as a failure.
    pub fn run(&self, graph: &DependencyGraph, batches: &[Batch]) -> Result<Vec<TaskOutcome>> {
        let groups: Vec<Batch> = if self.context.parallel {
            vec![batches.concat()]
        } else {
            batches.to_vec()
        };

        let total: usize = groups.iter().map(|g| g.len()).sum();
        if total == 0 {
            return Ok(Vec::new());
        }

        // Parallel mode is uncapped by design: one worker per package.
        let width = if self.context.parallel {
            total
        } else {
            self.context.concurrency.max(1)
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("monorun-worker-{}", i))
            .build()
            .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().unwrap());

        let sink = OutputSink::spawn(self.context.prefix, self.context.client.clone());
        let handle = sink.handle();

        let aborted = AtomicBool::new(false);
        let first_failure: Mutex<Option<TaskFailure>> = Mutex::new(None);
        let mut outcomes = Vec::with_capacity(total);

        for group in &groups {
            if self.context.bail && aborted.load(Ordering::SeqCst) {
                break;
            }

            let (tx, rx) = channel::unbounded();
            pool.install(|| {
                group.par_iter().for_each(|name| {
                    // Bail stops new tasks; in-flight siblings still finish.
                    if self.context.bail && aborted.load(Ordering::SeqCst) {
                        return;
                    }

                    let outcome = self.run_one(graph, name, &handle);
                    if let TaskStatus::Failed { ref message } = outcome.status {
                        aborted.store(true, Ordering::SeqCst);
                        if let Ok(mut slot) = first_failure.lock() {
                            slot.get_or_insert_with(|| TaskFailure {
                                package: name.clone(),
                                message: message.clone(),
                            });
                        }
                    }
                    let _ = tx.send(outcome);
                });
            });
            drop(tx);

            outcomes.extend(rx.iter());
        }

        // The handle holds a sender clone; release it so close() can drain.
        drop(handle);
        sink.close();

        if self.context.bail {
            if let Ok(mut slot) = first_failure.lock() {
                if let Some(failure) = slot.take() {
                    return Err(Error::RunAborted {
                        package: failure.package,
                        message: failure.message,
                    });
                }
            }
        } else {
            let failures: Vec<TaskFailure> = outcomes
                .iter()
                .filter_map(|o| match &o.status {
                    TaskStatus::Failed { message } => Some(TaskFailure {
                        package: o.package.clone(),
                        message: message.clone(),
                    }),
                    _ => None,
                })
                .collect();
            if !failures.is_empty() {
                return Err(Error::AggregateFailure { failures });
            }
        }

        Ok(outcomes)
    }

    fn run_one(&self, graph: &DependencyGraph, name: &str, sink: &SinkHandle) -> TaskOutcome {
        let started = Instant::now();

        let Some(package) = graph.get_package(name) else {
            return TaskOutcome {
                package: name.to_string(),
                status: TaskStatus::Skipped,
                stdout: String::new(),
                stderr: String::new(),
                duration: started.elapsed(),
            };
        };

        if !package.has_script(&self.context.script) {
            debug!(package = %name, script = %self.context.script, "no such script, skipping");
            return TaskOutcome {
                package: name.to_string(),
                status: TaskStatus::Skipped,
                stdout: String::new(),
                stderr: String::new(),
                duration: started.elapsed(),
            };
        }

        let invocation = ScriptInvocation {
            script: self.context.script.clone(),
            args: self.context.args.clone(),
            client: self.context.client.clone(),
        };

        let line_sink = self.context.stream.then_some(sink);
        match self.runner.run(package, &invocation, line_sink) {
            Ok(output) => {
                if !self.context.stream {
                    sink.send_block(name, output.stdout.clone(), output.stderr.clone());
                }
                let status = if output.success() {
                    TaskStatus::Success
                } else {
                    TaskStatus::Failed {
                        message: format!(
                            "script '{}' exited with code {}",
                            self.context.script, output.exit_code
                        ),
                    }
                };
                TaskOutcome {
                    package: name.to_string(),
                    status,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    duration: started.elapsed(),
                }
            }
            Err(e) => TaskOutcome {
                package: name.to_string(),
                status: TaskStatus::Failed {
                    message: e.to_string(),
                },
                stdout: String::new(),
                stderr: String::new(),
                duration: started.elapsed(),
            },
        }
    }
}
