//! Error types for the Goalward domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each layer of the decision cycle has its own error enum; only
//! [`StorageError`] is allowed to abort a cycle; the rest are recorded
//! as data inside the cycle's Decision.

use thiserror::Error;

/// The top-level error type for all Goalward operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Protocol error: {0}")]
    Parse(#[from] ParseError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The persistent store is unreachable or returned something unusable.
///
/// Fatal for the current cycle, never for the process.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Failures in the tool layer. Recorded in the Decision, never propagated
/// out of a cycle.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool {tool} has an invalid schema: {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("Invalid arguments for {tool}: {}", errors.join("; "))]
    SchemaValidation { tool: String, errors: Vec<String> },

    #[error("Tool execution failed: {tool}: {cause}")]
    Execution { tool: String, cause: String },

    #[error("Tool timed out: {tool} after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Raised by tool implementations themselves; the registry wraps it
    /// into [`ToolError::Execution`] before it leaves `invoke`.
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Short machine-readable label, stored alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::DuplicateTool { .. } => "duplicate_tool",
            ToolError::NotFound(_) => "not_found",
            ToolError::InvalidSchema { .. } => "invalid_schema",
            ToolError::SchemaValidation { .. } => "schema_validation",
            ToolError::Execution { .. } => "execution",
            ToolError::Timeout { .. } => "timeout",
            ToolError::InvalidArguments(_) => "invalid_arguments",
        }
    }
}

/// The reasoning service replied with something that is not a usable plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Malformed markup at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unexpected root element <{0}>, expected <decision>")]
    UnexpectedRoot(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// The reasoning-service exchange itself failed.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by reasoning service, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Reasoner not configured: {0}")]
    NotConfigured(String),
}
