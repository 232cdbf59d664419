//! `caldera apply`: expand, evaluate, converge, report

use crate::cli::ApplyArgs;
use crate::config::AgentConfig;
use crate::run_context::RunContext;
use anyhow::{Context, Result, bail};
use convergence::{OutcomeState, RunReport};
use std::fs;

pub fn run(config: &AgentConfig, args: ApplyArgs) -> Result<()> {
    let node_path = args.node.as_deref().unwrap_or_else(|| config.node_path());
    let roles_dir = args.roles.as_deref().unwrap_or_else(|| config.roles_dir());
    let cookbooks_dir = args
        .cookbooks
        .as_deref()
        .unwrap_or_else(|| config.cookbooks_dir());
    let mut context = RunContext::build(node_path, roles_dir, cookbooks_dir)?;
    log::info!(
        "applying {} ({} cookbooks loaded)",
        context.expansion.recipes.join(", "),
        context.cookbooks.len()
    );
    let report = context.converge();

    let report_path = args.report.as_deref().or(config.report_path.as_deref());
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("could not write {}", path.display()))?;
        log::info!("run report written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if let Some(failure) = &report.failure {
        bail!(
            "run failed at {} (action {}): {}",
            failure.resource,
            failure.action,
            failure.message
        );
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    for outcome in &report.resources {
        let marker = match outcome.state {
            OutcomeState::Updated => "+",
            OutcomeState::Failed if outcome.ignored => "!",
            OutcomeState::Failed => "x",
            OutcomeState::Skipped => "-",
            OutcomeState::Unchanged => "=",
            OutcomeState::Pending => ".",
        };
        println!("{marker} {} ({})", outcome.resource, outcome.action);
        if let Some(error) = &outcome.error {
            println!("    {error}");
        }
    }
    let summary = report.summary();
    println!(
        "{}: {} updated, {} unchanged, {} skipped, {} failed in {:.2}s",
        report.node_name,
        summary.updated,
        summary.unchanged,
        summary.skipped,
        summary.failed,
        report.elapsed_seconds
    );
}
