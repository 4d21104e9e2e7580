//! Core library for dependency-ordered script execution across a
//! multi-package repository.

pub mod cycles;
pub mod error;
pub mod filter;
pub mod graph;
pub mod output;
pub mod package;
pub mod registry;
pub mod runner;
pub mod schedule;
pub mod script;
pub mod select;

pub use cycles::{find_cycles, Cycle};
pub use error::{Error, Result};
pub use filter::PackageFilter;
pub use graph::DependencyGraph;
pub use output::{OutputSink, SinkHandle};
pub use package::Package;
pub use registry::Registry;
pub use runner::{RunContext, TaskFailure, TaskOutcome, TaskRunner, TaskStatus};
pub use schedule::{schedule, schedule_with_cycle_handler, Batch, CyclePolicy};
pub use script::{ProcessRunner, ScriptInvocation, ScriptOutput, ScriptRunner};
pub use select::apply_filter;
