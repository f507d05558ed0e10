//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a workflow file
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to a workflow document (.json, .json5, .yaml or .yml)
    pub file: PathBuf,

    /// Variable overrides (key=value), pushed before the run
    #[arg(long = "var", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,

    /// Report a failing workflow as a warning instead of an error
    #[arg(long)]
    pub soft: bool,
}

/// Run a project hook
#[derive(Debug, Args, Clone)]
pub struct HookCommand {
    /// Hook name as declared in repoutils.json
    pub name: String,

    /// Project directory
    #[arg(short = 'C', long = "directory", default_value = ".")]
    pub directory: PathBuf,

    /// Variable overrides (key=value), pushed before the hook's own vars
    #[arg(long = "var", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,
}

/// Validate a workflow without running it
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to a workflow document
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the project configuration
#[derive(Debug, Args, Clone)]
pub struct InfoCommand {
    /// Project directory
    #[arg(short = 'C', long = "directory", default_value = ".")]
    pub directory: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
