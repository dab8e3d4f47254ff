//! Reasoning-service implementations for Goalward.
//!
//! All implement the `goalward_core::Reasoner` trait.

pub mod openai_compat;

pub use openai_compat::{OpenAiCompatReasoner, OpenAiCompatSettings};
