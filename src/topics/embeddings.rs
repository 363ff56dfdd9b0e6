// Sentence embeddings using all-MiniLM-L6-v2.
//
// Each post is embedded into a 384-dimensional vector. Posts about the same
// thing land close together even when they share no words, which is what
// the k-means step relies on.
//
// The model runs locally via ONNX. Mean pooling is applied to token
// embeddings (matching the model's training).

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::traits::TextEmbedder;
use crate::error::PipelineError;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Sentence embedder using a local ONNX model.
///
/// Arc<Mutex<Session>> so the session can move into spawn_blocking,
/// Arc<Tokenizer> for shared ownership across the same boundary.
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
}

impl SentenceEmbedder {
    /// Load the sentence embedding model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Call `download_model()` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `topiclens download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `topiclens download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;

        debug!(
            "Loaded sentence embedding model from {}",
            model_dir.display()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl TextEmbedder for SentenceEmbedder {
    /// CPU-bound work is offloaded to spawn_blocking to keep the async
    /// runtime responsive.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || embed_sync(&session, &tokenizer, &texts))
            .await
            .context("spawn_blocking panicked")?
    }
}

/// Synchronous embedding: runs tokenization, inference, and mean pooling.
fn embed_sync(
    session: &Arc<Mutex<Session>>,
    tokenizer: &Arc<Tokenizer>,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings: Vec<_> = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch_size = encodings.len();
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);

    if max_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch_size]);
    }

    // BERT inputs: token ids and attention mask padded with 0,
    // token_type_ids all zeros for single-sentence input.
    let mut input_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut token_type_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);

    for enc in &encodings {
        let ids = enc.get_ids();
        let mask = enc.get_attention_mask();
        let seq_len = ids.len();

        input_ids_flat.extend(ids.iter().map(|&id| id as i64));
        attention_mask_flat.extend(mask.iter().map(|&m| m as i64));
        token_type_ids_flat.extend(std::iter::repeat_n(0i64, seq_len));

        let pad_len = max_len - seq_len;
        input_ids_flat.extend(std::iter::repeat_n(0i64, pad_len));
        attention_mask_flat.extend(std::iter::repeat_n(0i64, pad_len));
        token_type_ids_flat.extend(std::iter::repeat_n(0i64, pad_len));
    }

    let shape = [batch_size as i64, max_len as i64];

    let input_ids_tensor =
        Tensor::from_array((shape, input_ids_flat)).context("Failed to create input_ids tensor")?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask_flat.clone()))
        .context("Failed to create attention_mask tensor")?;
    let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids_flat))
        .context("Failed to create token_type_ids tensor")?;

    // last_hidden_state: [batch, seq_len, 384]
    let hidden_states = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            })
            .context("Embedding ONNX inference failed")?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;

        data.to_vec()
    };

    let mut embeddings = Vec::with_capacity(batch_size);

    for i in 0..batch_size {
        let mut sum = vec![0.0_f64; EMBEDDING_DIM];
        let mut mask_sum = 0.0_f64;

        for j in 0..max_len {
            let mask_val = attention_mask_flat[i * max_len + j] as f64;
            if mask_val > 0.0 {
                mask_sum += mask_val;
                let offset = (i * max_len + j) * EMBEDDING_DIM;
                for k in 0..EMBEDDING_DIM {
                    sum[k] += hidden_states[offset + k] as f64 * mask_val;
                }
            }
        }

        if mask_sum > 0.0 {
            for val in &mut sum {
                *val /= mask_sum;
            }
        }

        embeddings.push(sum);
    }

    debug!(
        batch_size = batch_size,
        dim = EMBEDDING_DIM,
        "Computed sentence embeddings"
    );

    Ok(embeddings)
}

/// Encode every text, `batch_size` texts per model call, and check the
/// result is usable for clustering: one vector per text, all the same length.
///
/// An empty input returns an empty output without touching the model.
pub async fn encode(
    embedder: &dyn TextEmbedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f64>>, PipelineError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.max(1);
    let pb = ProgressBar::new(texts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Embedding [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size) {
        let batch = embedder
            .embed_batch(chunk)
            .await
            .map_err(|e| PipelineError::encoding(format!("{e:#}")))?;

        if batch.len() != chunk.len() {
            pb.abandon();
            return Err(PipelineError::encoding(format!(
                "embedder returned {} vectors for {} texts",
                batch.len(),
                chunk.len()
            )));
        }

        vectors.extend(batch);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    check_dimensions(&vectors)?;

    info!(
        count = vectors.len(),
        dim = vectors.first().map(Vec::len).unwrap_or(0),
        "Encoded posts"
    );

    Ok(vectors)
}

/// Confirm every vector has the same, non-zero dimensionality.
pub fn check_dimensions(vectors: &[Vec<f64>]) -> Result<usize, PipelineError> {
    let Some(first) = vectors.first() else {
        return Ok(0);
    };

    let dim = first.len();
    if dim == 0 {
        return Err(PipelineError::encoding("embedding vectors are empty"));
    }

    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(PipelineError::encoding(format!(
            "vector {i} has {} dimensions, expected {dim}",
            v.len()
        )));
    }

    Ok(dim)
}

/// Arithmetic mean of a set of vectors. Returns an empty vector for empty input.
///
/// This is the topic centroid: the point a topic's members cluster around.
pub fn mean_vector<V: AsRef<[f64]>>(vectors: &[V]) -> Vec<f64> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };

    let n = vectors.len() as f64;
    let mut mean = vec![0.0_f64; first.as_ref().len()];

    for v in vectors {
        for (m, &x) in mean.iter_mut().zip(v.as_ref()) {
            *m += x;
        }
    }

    for m in &mut mean {
        *m /= n;
    }

    mean
}

/// Squared Euclidean distance. Compares the shared prefix if lengths differ.
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_distance(a, b).sqrt()
}
