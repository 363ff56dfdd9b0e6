// Text embedder trait: swap-ready abstraction.
//
// The pipeline only needs "texts in, equal-length vectors out". The default
// implementation runs a local ONNX sentence transformer; tests plug in
// embedders that place texts at fixed points.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for mapping texts to dense vectors, one per input, same order.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;
}
