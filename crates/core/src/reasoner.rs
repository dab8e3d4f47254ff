//! Reasoner trait: the abstraction over the remote reasoning service.
//!
//! A Reasoner takes a fully serialized situation and returns the service's
//! raw reply. Transport, authentication and rate limiting live behind this
//! trait; formatting and retry policy do not.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransportError;

/// A serialized decision request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestPayload(String);

impl RequestPayload {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RequestPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The core Reasoner trait.
///
/// Implementations: an OpenAI-compatible HTTP client, scripted fakes in tests.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// A human-readable name (e.g. "openai", "ollama").
    fn name(&self) -> &str;

    /// Send one request and return the raw reply text.
    async fn exchange(&self, request: &RequestPayload) -> Result<String, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Reasoner for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn exchange(&self, request: &RequestPayload) -> Result<String, TransportError> {
            Ok(request.as_str().to_string())
        }
    }

    #[tokio::test]
    async fn reasoner_is_object_safe() {
        let reasoner: Box<dyn Reasoner> = Box::new(Echo);
        let reply = reasoner
            .exchange(&RequestPayload::new("<request/>"))
            .await
            .unwrap();
        assert_eq!(reply, "<request/>");
    }
}
