//! Workflow execution: the engine, built-in steps, processes and extensions

pub mod engine;
pub mod extension;
pub mod fsops;
pub mod process;
pub mod steps;

pub use engine::{Engine, EngineSettings, PlannedStep, RunOutcome};
pub use extension::{Extension, ExtensionCatalog, ExtensionHost, ExtensionLoader};
pub use process::{Captured, CommandLine, ProcessRunner, ProcessSpec, StderrMode};
