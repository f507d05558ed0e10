//! Project configuration (`repoutils.json`) and its hooks

pub mod hook;

pub use hook::ProjectHook;

use crate::core::config::DocumentFormat;
use crate::core::error::{Error, Result};
use crate::core::tree::{ConfigTree, Shape};
use crate::core::variable::{make_pretty, render, Lookup, VERSION};
use crate::execution::engine::Engine;
use semver::Version;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of a project configuration
pub const PROJECT_CONFIG_FILE: &str = "repoutils.json";

const UNKNOWN: &str = "Unknown";
const MAINTAINER: Shape = Shape::OneOf(&[Shape::String, Shape::List]);

/// A loaded project configuration, includes already merged in
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_file: PathBuf,
    pub name: String,
    pub version: Version,
    pub description: String,
    pub min_version: Version,
    pub maintainer: Vec<String>,
    pub license: String,
    hooks: Vec<ProjectHook>,
    /// Every file that contributed, root first
    pub loaded_files: Vec<PathBuf>,
}

/// Serializable overview used by `repoutils info`
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(rename = "repoutils-min-version")]
    pub min_version: String,
    pub maintainer: Vec<String>,
    pub license: String,
    pub hooks: Vec<String>,
    pub files: Vec<String>,
}

impl ProjectConfig {
    /// Load `repoutils.json` from `project_dir`
    pub fn load<P: AsRef<Path>>(project_dir: P, vars: &dyn Lookup) -> Result<Self> {
        Self::from_file(project_dir.as_ref().join(PROJECT_CONFIG_FILE), vars)
    }

    pub fn from_file<P: AsRef<Path>>(config_file: P, vars: &dyn Lookup) -> Result<Self> {
        let config_file = resolve(config_file.as_ref())?;
        let mut loaded_files = vec![config_file.clone()];
        let tree = load_tree(&config_file, &mut loaded_files, vars)?;

        let name = tree.get_str("name", vars)?;
        let version = parse_version(&tree.get_str("version", vars)?)?;
        let description = tree.get_str_or("description", "", vars)?;
        let min_version = parse_version(&tree.get_str_or("repoutils-min-version", "0.0.0", vars)?)?;

        let running = parse_version(VERSION)?;
        if min_version > running {
            return Err(Error::config_with_hint(
                format!(
                    "The minimum version of repoutils required by the project '{}' is '{}'.",
                    make_pretty(&name, "<Unnamed>"),
                    min_version
                ),
                "Please upgrade repoutils to the required version.",
            ));
        }

        let maintainer = match tree.typed_get("maintainer", Some(Value::from(UNKNOWN)), MAINTAINER, vars)? {
            Value::Array(items) => items.iter().map(render).collect(),
            single => vec![render(&single)],
        };
        let license = tree.get_str_or("license", UNKNOWN, vars)?;

        let hooks = tree
            .get_tree_or_empty("hooks", vars)?
            .as_map()
            .iter()
            .map(|(name, raw)| {
                ConfigTree::from_value(raw.clone(), &format!("Hook '{name}'"))
                    .map(|raw| ProjectHook::new(name.clone(), raw))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config_file,
            name,
            version,
            description,
            min_version,
            maintainer,
            license,
            hooks,
            loaded_files,
        })
    }

    pub fn hooks(&self) -> &[ProjectHook] {
        &self.hooks
    }

    pub fn hook(&self, name: &str) -> Option<&ProjectHook> {
        self.hooks.iter().find(|hook| hook.name == name)
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name.as_str()).collect()
    }

    /// Run a hook by name
    pub async fn run_hook(&self, name: &str, engine: &mut Engine) -> Result<()> {
        let hook = self.hook(name).ok_or_else(|| {
            Error::config_with_hint(
                format!("Hook '{}' is not defined in project '{}'.", name, self.name),
                format!("Available hooks: {}.", make_pretty(self.hook_names().join(", "), "<none>")),
            )
        })?;
        hook.run(engine).await
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            name: self.name.clone(),
            version: self.version.to_string(),
            description: self.description.clone(),
            min_version: self.min_version.to_string(),
            maintainer: self.maintainer.clone(),
            license: self.license.clone(),
            hooks: self.hook_names().into_iter().map(str::to_string).collect(),
            files: self
                .loaded_files
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
        }
    }
}

impl std::fmt::Display for ProjectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

fn resolve(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| Error::fs(path, "resolve", e))
}

/// Parse a version, padding missing components with zeros (`1.2` is `1.2.0`)
pub fn parse_version(text: &str) -> Result<Version> {
    let text = text.trim();
    let split = text.find(['-', '+']).unwrap_or(text.len());
    let (core, rest) = text.split_at(split);

    let mut parts: Vec<&str> = core.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&format!("{}{}", parts.join("."), rest))
        .map_err(|e| Error::config(format!("Invalid version '{}': {}", text, e)))
}

/// Read one configuration file and merge in everything it includes
fn load_tree(config_file: &Path, loaded: &mut Vec<PathBuf>, vars: &dyn Lookup) -> Result<ConfigTree> {
    let text = fs::read_to_string(config_file).map_err(|e| Error::fs(config_file, "read", e))?;
    let origin = config_file.display().to_string();
    let mut tree = DocumentFormat::Json5.parse(&text, &origin).map_err(|error| {
        Error::config_with_hint(error.to_string(), "Configuration must be a JSON5 object.")
    })?;

    let includes = match tree.get_opt("includes", Shape::List, vars)? {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let base = config_file.parent().unwrap_or_else(|| Path::new("."));

    for include in includes {
        let Value::String(include) = include else {
            return Err(Error::config(format!("Invalid path in '{}'.", origin)));
        };

        let mut target = base.join(&include);
        if target.is_dir() {
            target = target.join(PROJECT_CONFIG_FILE);
        }

        let pattern = target.to_string_lossy().into_owned();
        let matches = glob::glob(&pattern)
            .map_err(|e| Error::config(format!("Invalid include pattern '{}' in '{}': {}", include, origin, e)))?;

        let mut matched = false;
        for entry in matches {
            matched = true;
            let path = entry.map_err(|e| Error::fs(e.path().to_path_buf(), "read", e.error()))?;
            let path = resolve(&path)?;
            if loaded.contains(&path) {
                debug!("Skipping already loaded configuration '{}'", path.display());
                continue;
            }
            loaded.push(path.clone());
            let included = load_tree(&path, loaded, vars)?;
            tree.merge(&included);
        }

        // A plain path has to exist; only patterns may match nothing
        if !matched && !include.contains(['*', '?', '[']) {
            return Err(Error::fs(target, "read", "file does not exist"));
        }
    }

    Ok(tree)
}
