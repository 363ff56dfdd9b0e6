// Error taxonomy for a pipeline run.
//
// Each variant maps to a distinct handling policy: input errors skip one
// record, configuration and encoding errors abort the run before or during
// clustering, and the two labeling errors are scoped to a single topic.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A post record is malformed or missing a required field.
    #[error("invalid input: {0}")]
    Input(String),

    /// Invalid settings (K larger than the corpus, unknown language code, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The generative service kept rate-limiting after every retry.
    #[error("topic {topic}: rate limited after {attempts} attempts: {last}")]
    RateLimit {
        topic: usize,
        attempts: u32,
        last: String,
    },

    /// Non-rate-limit failure from the generative service.
    #[error("topic {topic}: generative service failed: {message}")]
    ExternalService { topic: usize, message: String },

    /// The embedding model failed or produced unusable output.
    #[error("embedding failed: {0}")]
    Encoding(String),
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }
}
