//! Workflow and project documents from YAML or JSON5

use crate::core::error::{Error, Result};
use crate::core::tree::ConfigTree;
use serde_json::Value;
use std::path::Path;

/// Parser selected from a document's file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json5,
    Yaml,
}

impl DocumentFormat {
    const SUPPORTED: &'static str = ".json, .json5, .yaml, .yml";

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") | Some("json5") => Ok(DocumentFormat::Json5),
            Some("yaml") | Some("yml") => Ok(DocumentFormat::Yaml),
            _ => Err(Error::config_with_hint(
                format!("Unsupported document format '{}'.", path.display()),
                format!("Supported extensions are {}.", Self::SUPPORTED),
            )),
        }
    }

    /// Parse `text`; the root must be a mapping
    pub fn parse(&self, text: &str, origin: &str) -> Result<ConfigTree> {
        let value: Value = match self {
            DocumentFormat::Json5 => json5::from_str(text).map_err(|e| {
                Error::config(format!("Failed to parse '{origin}' as JSON5: {e}"))
            })?,
            DocumentFormat::Yaml => serde_yaml::from_str(text).map_err(|e| {
                Error::config(format!("Failed to parse '{origin}' as YAML: {e}"))
            })?,
        };

        // An empty YAML file parses to null
        let value = if value.is_null() {
            Value::Object(Default::default())
        } else {
            value
        };
        ConfigTree::from_value(value, &format!("Document '{origin}'"))
    }
}

/// Read and parse a document, picking the parser from its extension
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<ConfigTree> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|e| Error::fs(path, "read", e))?;
    format.parse(&text, &path.display().to_string())
}
