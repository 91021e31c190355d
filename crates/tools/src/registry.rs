//! Name-indexed tool registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use fault::{Error, Result};

use crate::catalog;
use crate::handler::ToolHandler;

/// Registered tools, iterated in name order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        for tool in catalog::builtin()? {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error::configuration(
                format!("Tool '{name}' is already registered"),
                format!("tools.{name}"),
            ));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolHandler>> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RemoteTool;
    use fault::ErrorCode;

    #[test]
    fn builtin_registry_is_sorted() {
        let registry = ToolRegistry::with_builtin().unwrap();
        assert_eq!(registry.len(), 15);
        let names: Vec<&str> = registry.iter().map(|t| t.name()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(registry.get("send_code_to_revit_secure").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(RemoteTool::new("delete_element", "first")))
            .unwrap();
        let err = registry
            .register(Arc::new(RemoteTool::new("delete_element", "second")))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
        assert_eq!(registry.len(), 1);
    }
}
