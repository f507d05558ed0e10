//! repoutils - declarative repository workflows, project hooks and plugins

pub mod cli;
pub mod core;
pub mod execution;
pub mod plugins;
pub mod project;

// Re-export commonly used types
pub use core::{
    ConfigTree, Error, ErrorKind, Result, Shape, Step, StepKind, StepMeta, Trigger, TriggerBus, VariableStack,
    Workflow,
};
pub use execution::{Engine, EngineSettings, Extension, ExtensionCatalog, ExtensionHost, ExtensionLoader, RunOutcome};
pub use plugins::AuditTrail;
pub use project::{ProjectConfig, ProjectHook};
