mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use monorun_core::{CyclePolicy, RunContext};
use tracing::Level;

#[derive(Parser)]
#[command(name = "monorun")]
#[command(about = "Run a package script across a multi-package repository in dependency order")]
struct Cli {
    /// Script to run in every selected package.
    script: String,

    /// Extra arguments forwarded to the script, after `--`.
    #[arg(last = true)]
    args: Vec<String>,

    #[arg(long, default_value = "./packages")]
    packages_dir: PathBuf,

    /// Interleave output lines as they arrive instead of buffering per package.
    #[arg(long, action)]
    stream: bool,

    /// Discard dependency order and run every selected package at once.
    #[arg(long, action)]
    parallel: bool,

    /// Disable the `name (client):` prefix on streamed lines.
    #[arg(long, action)]
    no_prefix: bool,

    /// Fail instead of warning when the dependency graph contains cycles.
    #[arg(long, action)]
    reject_cycles: bool,

    /// Concurrency cap per batch; defaults to the host's available parallelism.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Abort scheduling after the first failure (default).
    #[arg(long, action, conflicts_with = "no_bail")]
    bail: bool,

    /// Attempt every task and aggregate failures at the end.
    #[arg(long, action)]
    no_bail: bool,

    /// Client used to invoke scripts, passed through uninterpreted.
    #[arg(long, default_value = "npm")]
    npm_client: String,

    /// Only run packages whose name matches a glob. Repeatable.
    #[arg(long)]
    scope: Vec<String>,

    /// Skip packages whose name matches a glob. Repeatable.
    #[arg(long)]
    ignore: Vec<String>,

    /// Only run packages changed since the given git ref.
    #[arg(long)]
    since: Option<String>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    let policy = if cli.reject_cycles {
        CyclePolicy::Reject
    } else {
        CyclePolicy::Warn
    };

    let mut context = RunContext::new(cli.script)
        .with_args(cli.args)
        .with_parallel(cli.parallel)
        .with_stream(cli.stream)
        .with_prefix(!cli.no_prefix)
        .with_bail(cli.bail || !cli.no_bail)
        .with_client(cli.npm_client);
    if let Some(concurrency) = cli.concurrency {
        context = context.with_concurrency(concurrency);
    }

    commands::cmd_run(
        cli.packages_dir,
        context,
        policy,
        cli.scope,
        cli.ignore,
        cli.since,
    )
}
