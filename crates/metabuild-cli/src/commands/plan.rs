//! Plan command - show what the next build would do

use anyhow::{Context, Result};
use colored::Colorize;
use metabuild_build::{BuildPlan, Builder};
use std::path::Path;

pub fn run(meta: &Path, json: bool) -> Result<()> {
    let plan = Builder::new(meta)
        .plan()
        .with_context(|| format!("Failed to plan build from {}", meta.display()))?;

    if json {
        println!("{}", plan_json(&plan));
    } else {
        print_plan(&plan);
    }

    Ok(())
}

fn print_plan(plan: &BuildPlan) {
    println!("Compiling files:");
    for planned in &plan.units {
        match planned.staleness.reason() {
            Some(reason) => println!(
                "  {} {} ({})",
                "compile".yellow(),
                planned.unit.name,
                reason
            ),
            None => println!("  {} {}", "reuse".green(), planned.unit.name),
        }
        println!("    $ {}", planned.command);
    }
    println!("Now linking:");
    println!("    $ {}", plan.link_command);
}

fn plan_json(plan: &BuildPlan) -> serde_json::Value {
    let units: Vec<_> = plan
        .units
        .iter()
        .map(|planned| {
            serde_json::json!({
                "name": planned.unit.name,
                "source": planned.unit.source_path.display().to_string(),
                "object": planned.unit.object_path.display().to_string(),
                "stale": planned.staleness.is_stale(),
                "reason": planned.staleness.reason().map(|r| r.to_string()),
                "command": planned.command.command_line(),
            })
        })
        .collect();

    serde_json::json!({
        "executable": plan.project.exe_path().display().to_string(),
        "units": units,
        "link": plan.link_command.command_line(),
    })
}
