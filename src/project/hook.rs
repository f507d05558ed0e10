//! Project hooks

use crate::core::error::{Error, Result};
use crate::core::tree::{ConfigTree, Shape};
use crate::core::variable::{make_pretty, render, VarScope};
use crate::execution::engine::Engine;
use crate::execution::process::ProcessSpec;
use serde_json::Value;
use std::path::Path;
use tracing::info;

const COMMAND: Shape = Shape::OneOf(&[Shape::String, Shape::List]);
const INLINE_WORKFLOW: Shape = Shape::OneOf(&[Shape::Tree, Shape::List]);

/// A named entry point of a project: variables, then an inline workflow,
/// then an external workflow file, then a command.
#[derive(Debug, Clone)]
pub struct ProjectHook {
    pub name: String,
    raw: ConfigTree,
}

impl ProjectHook {
    pub fn new(name: impl Into<String>, raw: ConfigTree) -> Self {
        Self {
            name: name.into(),
            raw,
        }
    }

    pub fn raw(&self) -> &ConfigTree {
        &self.raw
    }

    /// Run the hook. Variables declared under `vars` are visible to every
    /// action and popped again on every exit path.
    pub async fn run(&self, engine: &mut Engine) -> Result<()> {
        info!("Running hook '{}'", self.name);
        let declared = self
            .raw
            .get_tree_or_empty("vars", &engine.variables)?
            .entries(&engine.variables);

        let mut scope = VarScope::new(engine);
        for (name, value) in declared {
            scope.push(name, value);
        }

        let command = non_empty(self.raw.get_opt("exec", COMMAND, &scope.variables)?);
        let external = non_empty(self.raw.get_opt("run", Shape::String, &scope.variables)?);
        let inline = non_empty(self.raw.get_opt("workflow", INLINE_WORKFLOW, &scope.variables)?);

        if command.is_none() && external.is_none() && inline.is_none() {
            return Err(Error::config_with_hint(
                format!("Hook '{}' is invalid.", make_pretty(&self.name, "<Unnamed>")),
                "A hook should contain at least one of 'exec', 'run' and 'workflow'.",
            ));
        }

        match inline {
            Some(Value::Array(steps)) => scope.run_inline_workflow(steps, true).await?.into_result()?,
            Some(Value::Object(document)) => scope
                .run_workflow_tree(ConfigTree::from(document), true)
                .await?
                .into_result()?,
            _ => {}
        }

        if let Some(path) = external {
            let path = render(&path);
            scope.run_workflow_file(Path::new(&path), true).await?.into_result()?;
        }

        if let Some(command) = command {
            let spec = match command {
                Value::Array(args) => ProcessSpec::argv(args.iter().map(render).collect()),
                line => ProcessSpec::shell(render(&line)),
            };
            scope.run_process(&spec, true).await?;
        }

        Ok(())
    }
}

/// Empty strings and lists count as absent
fn non_empty(value: Option<Value>) -> Option<Value> {
    value.filter(|value| match value {
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    })
}
