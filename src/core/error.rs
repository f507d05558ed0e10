//! Error types shared by the engine, the variable system and the plugins

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or running workflows
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed document, unknown step type, duplicate id, version mismatch...
    #[error("{message}")]
    Config {
        message: String,
        hint: Option<String>,
    },

    /// A tree read found a value of the wrong shape
    #[error("The value of key '{key}' needs to be {expected} instead of {actual}.")]
    TypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    /// A required key is absent and no default was supplied
    #[error("Missing required key '{0}'.")]
    MissingKey(String),

    /// `peek` on a name with no pushed values
    #[error("Variable '{0}' is not defined.")]
    UndefinedVariable(String),

    /// A spawned process exited with a non-zero code
    #[error("Command `{command}` exited with code {code}.")]
    Process { command: String, code: i32 },

    /// A spawned process exceeded the configured timeout
    #[error("Command `{command}` timed out after {secs} seconds.")]
    Timeout { command: String, secs: u64 },

    /// A process could not be started at all
    #[error("Failed to execute `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    /// A file system operation failed
    #[error("Failed to {operation} '{}': {reason}", .path.display())]
    Fs {
        path: PathBuf,
        operation: &'static str,
        reason: String,
    },

    /// Raised by a trigger handler or an extension
    #[error("Plugin error: {0}")]
    Plugin(String),
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    TypeMismatch,
    MissingKey,
    ExternalEffect,
    Plugin,
}

impl Error {
    /// Configuration error without a hint
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            hint: None,
        }
    }

    /// Configuration error with a remediation hint
    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn fs(path: impl Into<PathBuf>, operation: &'static str, reason: impl ToString) -> Self {
        Error::Fs {
            path: path.into(),
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn plugin(message: impl Into<String>) -> Self {
        Error::Plugin(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Configuration,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::MissingKey(_) | Error::UndefinedVariable(_) => ErrorKind::MissingKey,
            Error::Process { .. }
            | Error::Timeout { .. }
            | Error::Spawn { .. }
            | Error::Fs { .. } => ErrorKind::ExternalEffect,
            Error::Plugin(_) => ErrorKind::Plugin,
        }
    }

    /// Remediation hint shown to the user, when one exists
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Config { hint, .. } => hint.as_deref(),
            Error::Timeout { .. } => Some("Raise the limit with --timeout if the command is expected to be slow."),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
