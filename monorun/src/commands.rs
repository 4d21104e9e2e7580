//! The `run` command: registry → graph → schedule → select → execute.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use comfy_table::{Cell, Table};
use tracing::info;

use monorun_core::{
    apply_filter, schedule, CyclePolicy, DependencyGraph, PackageFilter, Registry, RunContext,
    TaskOutcome, TaskRunner, TaskStatus,
};

use crate::formatting::{format_duration, print_success, print_warning};

pub fn cmd_run(
    packages_dir: PathBuf,
    context: RunContext,
    policy: CyclePolicy,
    scope: Vec<String>,
    ignore: Vec<String>,
    since: Option<String>,
) -> Result<()> {
    let started = Instant::now();

    let packages = Registry::new(&packages_dir).list_packages()?;
    if packages.is_empty() {
        print_warning(&format!("no packages found under {}", packages_dir.display()));
        return Ok(());
    }

    // Filter prerequisites are checked before anything is scheduled.
    let mut filter = PackageFilter::new(&scope, &ignore)?;
    if let Some(ref since_ref) = since {
        filter = filter.with_changed_since(&packages, &packages_dir, since_ref)?;
    }

    let graph = DependencyGraph::new(packages);
    let batches = schedule(&graph, policy)?;
    let selected = apply_filter(&graph, &batches, |p| filter.matches(p));

    let selected_count: usize = selected.iter().map(|b| b.len()).sum();
    info!(
        script = %context.script,
        packages = selected_count,
        batches = selected.len(),
        "starting run"
    );

    let script = context.script.clone();
    let outcomes = TaskRunner::new(context).run(&graph, &selected)?;

    print_outcome_table(&outcomes);

    let attempted = outcomes.iter().filter(|o| o.status != TaskStatus::Skipped).count();
    let skipped = outcomes.len() - attempted;
    let mut summary = format!(
        "ran '{}' in {} package(s) in {}",
        script,
        attempted,
        format_duration(started.elapsed().as_secs_f64())
    );
    if skipped > 0 {
        summary.push_str(&format!(" ({} skipped, no such script)", skipped));
    }
    print_success(&summary);

    Ok(())
}

fn print_outcome_table(outcomes: &[TaskOutcome]) {
    let mut table = Table::new();
    table
        .set_header(vec![
            Cell::new("Status").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Package").add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Duration").add_attribute(comfy_table::Attribute::Bold),
        ])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);

    let mut rows = 0;
    for outcome in outcomes {
        match &outcome.status {
            TaskStatus::Success => {
                table.add_row(vec![
                    Cell::new("✓").fg(comfy_table::Color::Green),
                    Cell::new(&outcome.package).fg(comfy_table::Color::White),
                    Cell::new(format_duration(outcome.duration.as_secs_f64())),
                ]);
                rows += 1;
            }
            TaskStatus::Failed { message } => {
                table.add_row(vec![
                    Cell::new("✗").fg(comfy_table::Color::Red),
                    Cell::new(&outcome.package).fg(comfy_table::Color::Red),
                    Cell::new(message).fg(comfy_table::Color::Red),
                ]);
                rows += 1;
            }
            // Skipped packages stay out of the report entirely.
            TaskStatus::Skipped => {}
        }
    }

    if rows > 0 {
        println!("{table}");
        println!();
    }
}
