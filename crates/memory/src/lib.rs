//! Memory store implementations for Goalward.
//!
//! Both backends share the same scoring policy and summary aggregation,
//! so they rank and summarize identically.

pub mod in_memory;
pub mod scoring;
pub mod summary;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use scoring::{ScoreComponents, ScoringPolicy, rank_order};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
