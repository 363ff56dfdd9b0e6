// Unit tests for the clustering half of the pipeline.
//
// Tests the properties the later stages rely on: k-means assigns every
// vector exactly one id in [0, k) and is reproducible per seed, the encoder
// refuses unusable embeddings, and representatives come back ranked and
// within their snippet budget.

use anyhow::Result;
use async_trait::async_trait;

use topiclens::error::PipelineError;
use topiclens::posts::models::Post;
use topiclens::topics::embeddings::{encode, euclidean_distance, mean_vector};
use topiclens::topics::kmeans::KMeans;
use topiclens::topics::representatives::{select, select_all, SelectionParams};
use topiclens::topics::traits::TextEmbedder;

/// Three loose blobs in 3-D, 30 points, deterministic.
fn blobs() -> Vec<Vec<f64>> {
    let centers = [[0.0, 0.0, 0.0], [8.0, 8.0, 0.0], [0.0, 8.0, 8.0]];
    (0..30)
        .map(|i| {
            let c = centers[i % 3];
            let wobble = ((i * 7) % 11) as f64 * 0.05;
            vec![c[0] + wobble, c[1] - wobble, c[2] + wobble / 2.0]
        })
        .collect()
}

fn posts(n: usize) -> Vec<Post> {
    (0..n)
        .map(|i| Post::new(i, &format!("title {i}"), &"x".repeat(i * 40), &format!("/r/t/{i}")))
        .collect()
}

// ============================================================
// KMeans::fit: assignment properties
// ============================================================

#[test]
fn every_vector_gets_one_topic_in_range() {
    let vectors = blobs();
    for k in 1..=6 {
        let fit = KMeans::fit(&vectors, k, 42, 300).unwrap();
        assert_eq!(fit.assignments.len(), vectors.len());
        assert!(fit.assignments.iter().all(|&t| t < k), "k={k}");
        assert_eq!(fit.centroids.len(), k);
        assert_eq!(fit.sizes().iter().sum::<usize>(), vectors.len());
    }
}

#[test]
fn same_seed_same_assignment() {
    let vectors = blobs();
    let a = KMeans::fit(&vectors, 3, 7, 300).unwrap();
    let b = KMeans::fit(&vectors, 3, 7, 300).unwrap();
    assert_eq!(a.assignments, b.assignments);
    assert_eq!(a.centroids, b.centroids);
}

#[test]
fn separated_blobs_are_recovered() {
    let vectors = blobs();
    let fit = KMeans::fit(&vectors, 3, 42, 300).unwrap();
    for i in 3..vectors.len() {
        assert_eq!(fit.assignments[i], fit.assignments[i % 3], "point {i}");
    }
    assert_eq!(fit.sizes(), vec![10, 10, 10]);
}

#[test]
fn k_equal_to_n_gives_singletons() {
    let vectors = vec![vec![0.0], vec![5.0], vec![10.0]];
    let fit = KMeans::fit(&vectors, 3, 1, 300).unwrap();
    let mut ids = fit.assignments.clone();
    ids.sort();
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(fit.inertia.abs() < 1e-12);
}

#[test]
fn k_larger_than_corpus_is_configuration_error() {
    let err = KMeans::fit(&[vec![1.0], vec![2.0]], 3, 42, 300).unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
}

#[test]
fn ragged_vectors_are_encoding_error() {
    let err = KMeans::fit(&[vec![1.0, 2.0], vec![3.0]], 1, 42, 300).unwrap_err();
    assert!(matches!(err, PipelineError::Encoding(_)));
}

// ============================================================
// encode: output shape checks
// ============================================================

struct FixedEmbedder {
    dims: Vec<usize>,
    drop_last: bool,
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut out: Vec<Vec<f64>> = texts
            .iter()
            .enumerate()
            .map(|(i, _)| vec![1.0; self.dims[i % self.dims.len()]])
            .collect();
        if self.drop_last {
            out.pop();
        }
        Ok(out)
    }
}

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("text {i}")).collect()
}

#[tokio::test]
async fn encode_returns_one_vector_per_text() {
    let embedder = FixedEmbedder {
        dims: vec![4],
        drop_last: false,
    };
    let vectors = encode(&embedder, &texts(10), 3).await.unwrap();
    assert_eq!(vectors.len(), 10);
    assert!(vectors.iter().all(|v| v.len() == 4));
}

#[tokio::test]
async fn encode_rejects_missing_vectors() {
    let embedder = FixedEmbedder {
        dims: vec![4],
        drop_last: true,
    };
    let err = encode(&embedder, &texts(5), 8).await.unwrap_err();
    assert!(matches!(err, PipelineError::Encoding(_)));
}

#[tokio::test]
async fn encode_rejects_mixed_dimensions() {
    let embedder = FixedEmbedder {
        dims: vec![4, 5],
        drop_last: false,
    };
    let err = encode(&embedder, &texts(4), 8).await.unwrap_err();
    assert!(matches!(err, PipelineError::Encoding(_)));
}

#[tokio::test]
async fn encode_empty_input_is_empty() {
    let embedder = FixedEmbedder {
        dims: vec![4],
        drop_last: true,
    };
    assert!(encode(&embedder, &[], 8).await.unwrap().is_empty());
}

// ============================================================
// Representative selection over a fitted clustering
// ============================================================

#[test]
fn representatives_are_sorted_by_centroid_distance() {
    let vectors = blobs();
    let fit = KMeans::fit(&vectors, 3, 42, 300).unwrap();
    let posts = posts(vectors.len());
    let params = SelectionParams {
        max_posts: 5,
        snippet_chars: 1000,
        ..Default::default()
    };

    for topic in 0..3 {
        let reps = select(topic, &fit.assignments, &vectors, &posts, &params);
        assert_eq!(reps.len(), 5);

        let members: Vec<&Vec<f64>> = fit
            .members(topic)
            .into_iter()
            .map(|i| &vectors[i])
            .collect();
        let centroid = mean_vector(&members);

        let distances: Vec<f64> = reps
            .iter()
            .map(|r| {
                let id: usize = r.permalink.rsplit('/').next().unwrap().parse().unwrap();
                euclidean_distance(&vectors[id], &centroid)
            })
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{distances:?}");
    }
}

#[test]
fn representative_text_never_exceeds_budget() {
    let vectors = blobs();
    let fit = KMeans::fit(&vectors, 3, 42, 300).unwrap();
    let params = SelectionParams {
        max_posts: 10,
        snippet_chars: 50,
        ..Default::default()
    };

    let all = select_all(3, &fit.assignments, &vectors, &posts(vectors.len()), &params);
    for reps in all.values() {
        assert!(reps.iter().all(|r| r.text.chars().count() <= 50));
    }
}

#[test]
fn select_all_keeps_empty_topics() {
    let vectors = vec![vec![0.0], vec![1.0]];
    let all = select_all(4, &[0, 2], &vectors, &posts(2), &SelectionParams::default());
    assert_eq!(all.len(), 4);
    assert!(all[&1].is_empty());
    assert!(all[&3].is_empty());
}
