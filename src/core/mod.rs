//! Core domain models for repoutils
//!
//! Variables and templates, configuration trees, the trigger bus, and the
//! step and workflow types the engine builds.

pub mod config;
pub mod error;
pub mod registry;
pub mod step;
pub mod tree;
pub mod trigger;
pub mod variable;
pub mod workflow;

pub use config::{load_document, DocumentFormat};
pub use error::{Error, ErrorKind, Result};
pub use registry::StepRegistry;
pub use step::{Action, Step, StepKind, StepKindRef, StepMeta};
pub use tree::{ConfigTree, Shape};
pub use trigger::{Trigger, TriggerBus};
pub use variable::{interpolate, make_pretty, Lookup, Overlay, VarScope, VariableStack};
pub use workflow::Workflow;
