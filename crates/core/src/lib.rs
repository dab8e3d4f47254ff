//! # Goalward Core
//!
//! Domain types, traits, and error definitions for the Goalward autonomous
//! agent. Every other crate depends inward on this one.
//!
//! ## Design Philosophy
//!
//! Each collaborator of the decision cycle is a trait here:
//! - [`MemoryStore`]: durable notes and decisions
//! - [`TodoStore`]: the agent's mutable task list
//! - [`Tool`] / [`ToolRegistry`]: schema-validated capabilities
//! - [`Reasoner`]: the remote reasoning service
//!
//! Implementations live in their own crates, so tests can swap in fakes.

pub mod decision;
pub mod error;
pub mod event;
pub mod goal;
pub mod memory;
pub mod note;
pub mod reasoner;
pub mod todo;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use decision::{ActionPlan, ContextRef, Decision, DecisionId, NewDecision, Outcome, NO_OP_TOOL};
pub use error::{Error, ParseError, Result, StorageError, ToolError, TransportError};
pub use event::{CycleStage, DomainEvent, EventBus};
pub use goal::Goal;
pub use memory::{ContextQuery, MemoryStore, Summary, SummaryPeriod, TimeWindow};
pub use note::{NewNote, Note, NoteId};
pub use reasoner::{Reasoner, RequestPayload};
pub use todo::{NewTodo, Todo, TodoFilter, TodoId, TodoPatch, TodoStatus, TodoStore};
pub use tool::{Tool, ToolDefinition, ToolKind, ToolRegistry, ToolResult};
