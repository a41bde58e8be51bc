//! Tool registry fixed at session construction.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::schema::ToolDescriptor;
use crate::trait_::Tool;

/// Error from registry construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Tool already registered
    #[error("Tool already registered: {name}")]
    AlreadyRegistered {
        /// Duplicate name
        name: String,
    },

    /// Tool name is empty
    #[error("Tool name must not be empty")]
    EmptyName,
}

/// Collects tools before freezing them into a [`ToolRegistry`]
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty or already taken
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Result<Self, RegistryError> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name });
        }
        self.tools.insert(name, tool);
        Ok(self)
    }

    /// Freeze the registry
    #[must_use]
    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

/// Ordered, immutable set of tools available to a session.
///
/// Lookup is exact and case-sensitive. Registries are plain values handed to
/// the dispatcher, so independent sessions can hold different ones.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// Registry with no tools
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the builtin tools
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut tools: IndexMap<String, Arc<dyn Tool>> = IndexMap::new();
        for tool in crate::builtin::all() {
            tools.entry(tool.name().to_string()).or_insert(tool);
        }
        Self { tools }
    }

    /// Look up a tool by exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(Arc::clone)
    }

    /// Check if a tool is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, in registration order
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Descriptors, in registration order
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor().clone()).collect()
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}
