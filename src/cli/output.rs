//! CLI output formatting and the console reporter

use crate::core::error::{Error, Result};
use crate::core::step::Step;
use crate::core::trigger::Trigger;
use crate::core::variable::make_pretty;
use crate::core::workflow::Workflow;
use crate::execution::{PlannedStep, ProcessSpec};
use crate::project::ProjectConfig;
use console::Emoji;
use std::path::Path;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Sign the console reporter registers under
pub const CONSOLE_SIGN: &str = "console";

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Format an error with its hint, if any
pub fn format_error(error: &Error) -> String {
    let mut text = format!("{} {}", CROSS, style(error).red());
    if let Some(hint) = error.hint() {
        text.push_str(&format!("\n{} {}", INFO, style(hint).yellow()));
    }
    text
}

/// Format the resolved steps of a workflow for `validate`
pub fn format_plan(workflow: &Workflow, plan: &[PlannedStep]) -> String {
    let mut lines = vec![format!(
        "{} Workflow {} ({}) is valid",
        CHECK,
        style(workflow).bold(),
        style(short_id(&workflow.id)).dim()
    )];
    for (index, step) in plan.iter().enumerate() {
        lines.push(format!(
            "  {}. {} {} {}",
            index + 1,
            style(make_pretty(&step.name, &step.id)).cyan(),
            style(format!("[{}]", step.kind)).dim(),
            style(&step.id).dim()
        ));
    }
    lines.join("\n")
}

/// Format a project overview for `info`
pub fn format_project(project: &ProjectConfig) -> String {
    let mut lines = vec![
        format!(
            "{} {} {}",
            INFO,
            style(&project.name).bold(),
            style(&project.version).dim()
        ),
        format!("  Description: {}", make_pretty(&project.description, "-")),
        format!("  Maintainer:  {}", project.maintainer.join(", ")),
        format!("  License:     {}", project.license),
        format!("  Requires:    repoutils >= {}", project.min_version),
    ];

    let hooks = project.hook_names();
    if hooks.is_empty() {
        lines.push(format!("  Hooks:       {}", style("none").dim()));
    } else {
        lines.push("  Hooks:".to_string());
        for hook in hooks {
            lines.push(format!("    - {}", style(hook).cyan()));
        }
    }
    lines.join("\n")
}

/// Prints workflow progress and step effects as they happen
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    fn effect(&self, verb: &str, detail: String) -> Result<()> {
        println!("   {} {}", style(verb).dim(), detail);
        Ok(())
    }
}

fn path(path: &Path) -> String {
    style(path.display()).underlined().to_string()
}

impl Trigger for ConsoleReporter {
    fn pre_run_workflow(&self, workflow: &Workflow) -> Result<()> {
        println!(
            "{} Running workflow {} ({})",
            ROCKET,
            style(workflow).bold(),
            style(short_id(&workflow.id)).dim()
        );
        Ok(())
    }

    fn post_run_workflow(&self, workflow: &Workflow) -> Result<()> {
        println!(
            "{} Workflow {} {}",
            CHECK,
            style(workflow).bold(),
            style("completed").green()
        );
        Ok(())
    }

    fn pre_run_workflow_step(&self, step: &Step) -> Result<()> {
        println!(
            "{} {} {}",
            SPINNER,
            style(step).cyan(),
            style(format!("[{}]", step.kind())).dim()
        );
        Ok(())
    }

    fn post_run_workflow_step(&self, step: &Step) -> Result<()> {
        println!("{} {}", CHECK, style(step).green());
        Ok(())
    }

    fn on_mkdir(&self, dir: &Path) -> Result<()> {
        self.effect("mkdir", path(dir))
    }

    fn on_move_file(&self, src: &Path, dst: &Path) -> Result<()> {
        self.effect("move", format!("{} → {}", path(src), path(dst)))
    }

    fn on_copy(&self, src: &Path, dst: &Path) -> Result<()> {
        self.effect("copy", format!("{} → {}", path(src), path(dst)))
    }

    fn on_remove(&self, target: &Path) -> Result<()> {
        self.effect("remove", path(target))
    }

    fn on_output(&self, msg: &str) -> Result<()> {
        println!("{}", msg);
        Ok(())
    }

    fn on_warning(&self, message: &str) -> Result<()> {
        eprintln!("{} {}", WARN, style(message).yellow());
        Ok(())
    }

    fn pre_exec_process(&self, process: &ProcessSpec) -> Result<()> {
        self.effect("$", style(process).bold().to_string())
    }

    fn post_exec_process(&self, process: &ProcessSpec, retcode: i32, raise_exc: bool) -> Result<()> {
        if retcode == 0 {
            return Ok(());
        }
        let icon = if raise_exc { CROSS } else { WARN };
        println!(
            "{} {} exited with code {}",
            icon,
            style(process).dim(),
            style(retcode).red()
        );
        Ok(())
    }
}
