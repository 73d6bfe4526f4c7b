//! Tool system: definitions, registry, and the built-in tool set.

pub mod builtin;
pub mod registry;
pub mod types;

pub use registry::{Tool, ToolRegistry};
pub use types::{ToolContext, ToolDefinition, ToolResult};

use crate::retrieval::ContextProvider;
use std::sync::Arc;

/// Build the registry with every built-in tool registered.
/// `search_docs` shares the answer chain's context provider.
pub fn create_default_registry(retrieval: Arc<dyn ContextProvider>, k: usize) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(builtin::GetTimeTool));
    registry.register(Arc::new(builtin::GetDateTool));
    registry.register(Arc::new(builtin::SearchDocsTool::new(retrieval, k)));
    registry.register(Arc::new(builtin::AnalyzeSentimentTool));
    registry.register(Arc::new(builtin::WebSearchTool));
    registry
}
