//! # Goalward Agent
//!
//! The decision engine and the scheduler that drives it.
//!
//! Each cycle gathers context from memory, asks the reasoning service for
//! exactly one action, validates it against the tool registry, runs it, and
//! appends a Decision. The scheduler then picks how long to wait before the
//! next cycle.

pub mod engine;
pub mod retry;
pub mod scheduler;

pub use engine::{CycleReport, DecisionEngine, ENGINE_CATEGORY, EngineSettings};
pub use retry::RetryPolicy;
pub use scheduler::{CycleScheduler, CycleState, IntervalPolicy};
