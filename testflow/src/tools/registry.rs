//! Tool trait and the per-stage tool set.

use super::ToolDefinition;
use crate::errors::ToolError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Trait for tool implementations.
///
/// Tools are synchronous; callers on an async runtime should invoke them
/// through `spawn_blocking`.
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool with a JSON arguments object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the arguments are invalid or the tool fails.
    fn invoke(&self, args: &Value) -> Result<Value, ToolError>;

    /// Returns the tool's name.
    fn name(&self) -> String {
        self.definition().name
    }
}

/// A named collection of tools offered to one stage.
#[derive(Default)]
pub struct ToolSet {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolSet {
    /// Creates an empty tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&self, tool: impl Tool + 'static) {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        self.tools.write().insert(tool.name(), tool);
    }

    /// Registers a tool and returns the set, for chaining.
    #[must_use]
    pub fn with(self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Returns a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Returns the names of all registered tools, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Returns the definitions of all registered tools.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.read().values().map(|t| t.definition()).collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Returns true if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Invokes a tool by name.
    ///
    /// Arguments must be a JSON object carrying every required parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] for unknown tools, or whatever the tool
    /// itself returns.
    pub fn invoke(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let Some(obj) = args.as_object() else {
            return Err(ToolError::invalid_arguments(name, "arguments must be a JSON object"));
        };
        let definition = tool.definition();
        if let Some(missing) = definition
            .required_params()
            .into_iter()
            .find(|p| !obj.contains_key(*p))
        {
            return Err(ToolError::invalid_arguments(
                name,
                format!("missing required parameter '{missing}'"),
            ));
        }

        debug!(tool = name, "Invoking tool");
        tool.invoke(args)
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .finish()
    }
}

/// Reads a required string argument.
pub(crate) fn string_arg<'a>(tool: &str, args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_arguments(tool, format!("'{key}' must be a string")))
}
