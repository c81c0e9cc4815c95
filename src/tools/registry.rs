//! Tool Registry: the read-only-after-startup map of tool name to handler.
//!
//! Adapted from the donor's `llm/registry.rs`; moved out of `llm/` since
//! spec.md treats the registry as a component in its own right (§4.3), not
//! LLM-provider-specific plumbing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::Tool;

use super::{declaration_for, ToolHandler};

/// Registry for managing tools.
///
/// # Example
///
/// ```no_run
/// use agent_core::tools::{ToolRegistry, BashTool};
///
/// let registry = ToolRegistry::new().register(BashTool::new());
/// let tools = registry.get_tools_for_llm();
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Names starting with `_` are rejected — the Rust
    /// equivalent of the original's reflection-time "private function"
    /// skip, applied at registration since there is no reflection here.
    pub fn register<T: ToolHandler + 'static>(mut self, tool: T) -> Self {
        self.register_arc(Arc::new(tool));
        self
    }

    pub fn register_arc(&mut self, tool: Arc<dyn ToolHandler>) {
        let name = tool.name().to_string();
        if name.starts_with('_') {
            log::warn!("registry: refusing to register private-looking tool name '{}'", name);
            return;
        }
        self.tools.insert(name, tool);
    }

    /// Register the crate's illustrative built-in handlers.
    pub fn register_all_builtin(mut self) -> Self {
        for tool in super::builtin_handlers() {
            self.register_arc(tool);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn get_tools_for_llm(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|handler| declaration_for(handler.as_ref()))
            .collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ToolRegistry {
    fn clone(&self) -> Self {
        Self {
            tools: self.tools.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::BashTool;

    #[test]
    fn test_registry_creation() {
        let registry = ToolRegistry::new();
        assert!(registry.tool_names().is_empty());
    }

    #[test]
    fn test_register_all_builtin() {
        let registry = ToolRegistry::new().register_all_builtin();
        assert!(registry.get("bash").is_some());
    }

    #[test]
    fn test_get_tools_for_llm() {
        let registry = ToolRegistry::new().register_all_builtin();
        let tools = registry.get_tools_for_llm();
        let bash_tool = tools.iter().find(|t| t.name == "bash");
        assert!(bash_tool.is_some());
        assert!(bash_tool.unwrap().description.len() > 50);
    }

    #[test]
    fn test_has_tool() {
        let registry = ToolRegistry::new().register_all_builtin();
        assert!(registry.has_tool("bash"));
        assert!(!registry.has_tool("nonexistent"));
    }

    #[test]
    fn test_private_name_is_rejected() {
        struct Hidden;
        impl ToolHandler for Hidden {
            fn name(&self) -> &str {
                "_hidden"
            }
            fn brief(&self) -> &str {
                "hidden"
            }
            fn full_description(&self) -> String {
                "hidden".to_string()
            }
            fn parameters(&self) -> serde_json::Value {
                serde_json::json!({"type": "object", "properties": {}})
            }
            fn execute<'a>(
                &'a self,
                _call: &'a crate::llm::ToolCall,
            ) -> super::super::BoxFuture<'a, Result<String, String>> {
                Box::pin(async { Ok(String::new()) })
            }
        }

        let registry = ToolRegistry::new().register(Hidden);
        assert!(!registry.has_tool("_hidden"));
    }

    #[test]
    fn test_bash_registers_under_its_own_name() {
        let registry = ToolRegistry::new().register(BashTool::new());
        assert!(registry.has_tool("bash"));
    }
}
