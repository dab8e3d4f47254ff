//! Built-in tool implementations for Goalward.
//!
//! Tools are how the agent acts on its plan: write notes, read them
//! back, keep a task list, and do arithmetic over what it has recorded. All of them go
//! through the same registry contract as any external tool would.

pub mod calculator;
pub mod no_op;
pub mod note_search;
pub mod note_take;
pub mod todo;

use goalward_core::error::ToolError;
use goalward_core::memory::MemoryStore;
use goalward_core::todo::TodoStore;
use goalward_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use calculator::CalculatorTool;
pub use no_op::NoOpTool;
pub use note_search::NoteSearchTool;
pub use note_take::NoteTakeTool;
pub use todo::TodoTool;

/// Create a registry with every built-in tool, each execution bounded by `timeout`.
pub fn default_registry(
    store: Arc<dyn MemoryStore>,
    todos: Arc<dyn TodoStore>,
    timeout: Duration,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new().with_timeout(timeout);
    registry.register(Box::new(NoteTakeTool::new(Arc::clone(&store))))?;
    registry.register(Box::new(NoteSearchTool::new(store)))?;
    registry.register(Box::new(CalculatorTool))?;
    registry.register(Box::new(TodoTool::new(todos)))?;
    registry.register(Box::new(NoOpTool))?;
    Ok(registry)
}
