//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HookCommand, InfoCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Repository workflow orchestrator
#[derive(Debug, Parser, Clone)]
#[command(name = "repoutils")]
#[command(version)]
#[command(about = "Run declarative repository workflows and project hooks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Timeout for every spawned process, in seconds
    #[arg(long, global = true, default_value_t = 3600)]
    pub timeout: u64,

    /// Append every trigger to this file as JSON lines
    #[arg(long, global = true)]
    pub audit: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow file
    Run(RunCommand),

    /// Run a hook of the project
    Hook(HookCommand),

    /// Validate a workflow file
    Validate(ValidateCommand),

    /// Show the project configuration
    Info(InfoCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
