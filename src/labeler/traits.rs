// Text generator trait: the seam between the labeler and whichever
// generative language service is behind it.
//
// Implementations must tell a rate-limit signal apart from every other
// failure: only the former is worth retrying.

use async_trait::async_trait;
use thiserror::Error;

/// Why a single generation call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The service asked us to slow down (HTTP 429 / RESOURCE_EXHAUSTED).
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Anything else: transport, auth, malformed or empty response.
    #[error("{0}")]
    Failed(String),
}

/// A prompt-in, text-out completion capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
