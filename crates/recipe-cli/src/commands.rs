use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use recipe_actions::StaticActionRegistry;
use recipe_history::{GcReport, HistoryConfig, HistoryMutator, PreparationDetails};

use crate::cli::*;
use crate::script::{self, Outcome, Script};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => HistoryConfig::load(path)?,
        None => HistoryConfig::default(),
    };
    match cli.command {
        Command::Run(args) => cmd_run(args, config, cli.format),
        Command::Actions => cmd_actions(cli.format),
        Command::Config => cmd_config(&config, cli.format),
    }
}

#[derive(Serialize)]
struct OperationView {
    operation: String,
    head: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct StepView {
    position: usize,
    id: String,
    actions: Vec<recipe_types::Action>,
    created: Vec<String>,
    deleted: Vec<String>,
}

#[derive(Serialize)]
struct RunView {
    preparation: String,
    head: String,
    operations: Vec<OperationView>,
    steps: Vec<StepView>,
    columns: Vec<(String, String)>,
    gc: Option<GcReport>,
}

fn cmd_run(args: RunArgs, config: HistoryConfig, format: OutputFormat) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("cannot read {}", args.script.display()))?;
    let script = Script::parse(&source)?;
    let mutator = HistoryMutator::in_memory(config);
    let id = script.create(&mutator)?;
    debug!(
        script = %args.script.display(),
        preparation = %id,
        operations = script.operations.len(),
        "running script"
    );

    let mut operations = Vec::with_capacity(script.operations.len());
    for operation in &script.operations {
        let label = operation.label();
        match script::apply(&mutator, &id, operation)? {
            Outcome::Head(head) => {
                if format == OutputFormat::Text {
                    println!("{} {:<40} head {}", "✓".green(), label, head.short_hex().yellow());
                }
                operations.push(OperationView {
                    operation: label,
                    head: Some(head.to_hex()),
                    error: None,
                });
            }
            Outcome::Refused(e) => {
                if !args.keep_going {
                    return Err(e).with_context(|| format!("{label} failed"));
                }
                if format == OutputFormat::Text {
                    println!("{} {:<40} {}: {}", "✗".red(), label, e.kind().to_string().red(), e);
                }
                operations.push(OperationView {
                    operation: label,
                    head: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let details = mutator.get_details(&id, None)?;
    let gc = if args.gc {
        Some(mutator.collect_garbage()?)
    } else {
        None
    };

    match format {
        OutputFormat::Text => print_details(&details, gc.as_ref()),
        OutputFormat::Json => {
            let view = RunView {
                preparation: id.to_string(),
                head: details.head_id.to_hex(),
                operations,
                steps: step_views(&details),
                columns: details
                    .row_metadata
                    .columns()
                    .iter()
                    .map(|c| (c.id.to_string(), c.name.clone()))
                    .collect(),
                gc,
            };
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}

fn step_views(details: &PreparationDetails) -> Vec<StepView> {
    details
        .steps
        .iter()
        .enumerate()
        .map(|(position, step)| StepView {
            position,
            id: step.id.to_hex(),
            actions: step.actions.clone(),
            created: step.diff.created_columns.iter().map(|c| c.to_string()).collect(),
            deleted: step.diff.deleted_columns.iter().map(|c| c.to_string()).collect(),
        })
        .collect()
}

fn describe(action: &recipe_types::Action) -> String {
    let params: Vec<String> = action
        .parameters
        .iter()
        .filter(|(k, _)| k.as_str() != "scope")
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    format!("{} {}", action.name, params.join(" "))
}

fn print_details(details: &PreparationDetails, gc: Option<&GcReport>) {
    println!();
    println!(
        "Preparation {} ({} steps)",
        details.preparation_id.to_string().bold(),
        details.len() - 1
    );
    for (position, step) in details.steps.iter().enumerate() {
        if position == 0 {
            println!("  {:>3}  {}  {}", 0, step.id.short_hex().dimmed(), "root".dimmed());
            continue;
        }
        let actions: Vec<String> = step.actions.iter().map(describe).collect();
        let mut line = format!(
            "  {:>3}  {}  {}",
            position,
            step.id.short_hex().yellow(),
            actions.join(", ")
        );
        if !step.diff.created_columns.is_empty() {
            line.push_str(&format!("  +{:?}", step.diff.created_columns).green().to_string());
        }
        if !step.diff.deleted_columns.is_empty() {
            line.push_str(&format!("  -{:?}", step.diff.deleted_columns).red().to_string());
        }
        println!("{line}");
    }
    let columns: Vec<String> = details
        .row_metadata
        .columns()
        .iter()
        .map(|c| format!("{} {}", c.id, c.name))
        .collect();
    println!("Columns: {}", columns.join(", "));
    if let Some(report) = gc {
        println!(
            "{} GC: {} steps and {} action lists removed",
            "✓".green(),
            report.steps_removed,
            report.actions_removed
        );
    }
}

fn cmd_actions(format: OutputFormat) -> anyhow::Result<()> {
    let registry = StaticActionRegistry::with_defaults();
    let names: Vec<&str> = registry.names().collect();
    match format {
        OutputFormat::Text => {
            for name in names {
                println!("  {}", name.cyan());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
    }
    Ok(())
}

fn cmd_config(config: &HistoryConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{} = {}", "app_version".bold(), config.app_version);
            println!("{} = {}", "lock_owner".bold(), config.lock_owner);
            println!("{} = {}", "heal_broken_chains".bold(), config.heal_broken_chains);
            println!("{} = {}", "max_steps".bold(), config.max_steps);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}
