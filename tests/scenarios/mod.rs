//! Scenario-based tests for repoutils

mod extensions;
mod failure_handling;
mod hooks;
mod sub_workflow;
