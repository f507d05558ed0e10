use anyhow::{Context, Result};
use repoutils::cli::commands::{HookCommand, InfoCommand, RunCommand, ValidateCommand};
use repoutils::cli::output::*;
use repoutils::cli::{Cli, Command};
use repoutils::plugins::AUDIT_SIGN;
use repoutils::{AuditTrail, Engine, EngineSettings, ProjectConfig, RunOutcome, Workflow};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::from_args();
    init_logging(cli.verbose)?;

    if let Err(error) = dispatch(&cli).await {
        match error.downcast_ref::<repoutils::Error>() {
            Some(error) => eprintln!("{}", format_error(error)),
            None => eprintln!("{} {}", CROSS, style(format!("{:#}", error)).red()),
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Stderr subscriber; `RUST_LOG` overrides the level picked from `--verbose`
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("repoutils={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to set logging subscriber")
}

async fn dispatch(cli: &Cli) -> Result<()> {
    // -C behaves like `git -C`: everything runs from the project directory
    match &cli.command {
        Command::Hook(HookCommand { directory, .. }) | Command::Info(InfoCommand { directory, .. }) => {
            enter(directory)?
        }
        _ => {}
    }

    let mut engine = build_engine(cli)?;

    match &cli.command {
        Command::Run(cmd) => run_workflow(&mut engine, cmd).await,
        Command::Hook(cmd) => run_hook(&mut engine, cmd).await,
        Command::Validate(cmd) => validate_workflow(&engine, cmd),
        Command::Info(cmd) => show_info(&engine, cmd),
    }
}

fn enter(directory: &Path) -> Result<()> {
    if directory == Path::new(".") {
        return Ok(());
    }
    std::env::set_current_dir(directory)
        .with_context(|| format!("Failed to enter project directory '{}'", directory.display()))
}

fn build_engine(cli: &Cli) -> Result<Engine> {
    let mut engine = Engine::new(EngineSettings::new().with_timeout(cli.timeout));

    engine
        .triggers
        .register(CONSOLE_SIGN, Arc::new(ConsoleReporter::new()))?;

    if let Some(path) = &cli.audit {
        let trail = AuditTrail::open(path)
            .with_context(|| format!("Failed to open audit file '{}'", path.display()))?;
        engine.triggers.register(AUDIT_SIGN, Arc::new(trail))?;
    }

    Ok(engine)
}

fn push_overrides(engine: &mut Engine, vars: &[(String, String)]) {
    for (key, value) in vars {
        engine.variables.push(key.as_str(), value.as_str());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
}

async fn run_workflow(engine: &mut Engine, cmd: &RunCommand) -> Result<()> {
    push_overrides(engine, &cmd.vars);

    match engine.run_workflow_file(&cmd.file, !cmd.soft).await? {
        RunOutcome::Completed => println!(
            "\n{} {} completed {}",
            CHECK,
            style(cmd.file.display()).bold(),
            style("successfully").green()
        ),
        RunOutcome::Failed(_) => println!(
            "\n{} {} {}",
            WARN,
            style(cmd.file.display()).bold(),
            style("failed (ignored with --soft)").yellow()
        ),
    }
    Ok(())
}

async fn run_hook(engine: &mut Engine, cmd: &HookCommand) -> Result<()> {
    let project = ProjectConfig::load(".", &engine.variables)?;
    println!(
        "{} Loaded project: {}",
        INFO,
        style(&project).bold()
    );

    push_overrides(engine, &cmd.vars);
    project.run_hook(&cmd.name, engine).await?;

    println!(
        "\n{} Hook {} completed {}",
        CHECK,
        style(&cmd.name).bold(),
        style("successfully").green()
    );
    Ok(())
}

fn validate_workflow(engine: &Engine, cmd: &ValidateCommand) -> Result<()> {
    let workflow = Workflow::from_file(&cmd.file, &engine.variables)?;
    let plan = engine.plan(&workflow)?;

    if cmd.json {
        let data = serde_json::json!({
            "id": workflow.id,
            "name": workflow.name,
            "steps": plan,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{}", format_plan(&workflow, &plan));
    }
    Ok(())
}

fn show_info(engine: &Engine, cmd: &InfoCommand) -> Result<()> {
    let project = ProjectConfig::load(".", &engine.variables)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&project.summary())?);
    } else {
        println!("{}", format_project(&project));
    }
    Ok(())
}
