//! # Goalward Protocol
//!
//! The exchange format between the decision engine and the reasoning
//! service: a request built from goal, context and tool catalog, and a
//! reply that names one tool, its arguments and a rationale.
//!
//! Both directions use a small tagged-markup dialect. Building is
//! deterministic; parsing is strict on required fields and tolerant of
//! unknown ones. Retries are the engine's business, not this crate's.

pub mod interval;
pub mod markup;
pub mod request;
pub mod response;

pub use interval::parse_interval;
pub use request::{RESPONSE_INSTRUCTIONS, build_request, canonical_json};
pub use response::parse_response;
