// K-means clustering over post embeddings.
//
// Lloyd's algorithm with k-means++ seeding. All randomness comes from a
// StdRng seeded by the caller, so the same vectors and seed always give the
// same assignment. Nearest-centroid ties go to the lowest topic id.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::embeddings::{check_dimensions, mean_vector, squared_distance};
use crate::error::PipelineError;

/// Default cap on Lloyd iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// A fitted clustering: one topic id per input vector plus the final centroids.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub centroids: Vec<Vec<f64>>,
    /// Topic id for each input vector, same order as the input.
    pub assignments: Vec<usize>,
    /// Lloyd iterations actually run.
    pub iterations: usize,
    /// Within-cluster sum of squared distances to the centroid.
    pub inertia: f64,
}

impl KMeans {
    /// Partition `vectors` into `k` topics.
    ///
    /// Fails with a configuration error when `k` is zero or larger than the
    /// number of vectors, and with an encoding error when the vectors don't
    /// share one dimensionality.
    pub fn fit(
        vectors: &[Vec<f64>],
        k: usize,
        seed: u64,
        max_iterations: usize,
    ) -> Result<Self, PipelineError> {
        if k == 0 {
            return Err(PipelineError::configuration("number of topics must be at least 1"));
        }
        if k > vectors.len() {
            return Err(PipelineError::configuration(format!(
                "cannot form {k} topics from {} posts",
                vectors.len()
            )));
        }
        check_dimensions(vectors)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = init_plus_plus(vectors, k, &mut rng);

        let n = vectors.len();
        let mut assignments = vec![usize::MAX; n];
        let mut iterations = 0;

        loop {
            let mut next: Vec<usize> = vectors.iter().map(|v| nearest(v, &centroids)).collect();
            let reseeded = fill_empty_clusters(vectors, &centroids, &mut next, k);
            let changed = reseeded || next != assignments;
            assignments = next;
            centroids = recompute_centroids(vectors, &assignments, k);
            iterations += 1;

            if !changed || iterations >= max_iterations.max(1) {
                break;
            }
        }

        let inertia = vectors
            .iter()
            .zip(&assignments)
            .map(|(v, &c)| squared_distance(v, &centroids[c]))
            .sum();

        info!(k, iterations, inertia, "K-means converged");

        Ok(Self {
            centroids,
            assignments,
            iterations,
            inertia,
        })
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Indices of the vectors assigned to `topic`, in input order.
    pub fn members(&self, topic: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == topic)
            .map(|(i, _)| i)
            .collect()
    }

    /// Member count per topic id.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k()];
        for &c in &self.assignments {
            sizes[c] += 1;
        }
        sizes
    }
}

/// Index of the nearest centroid. Strict `<` keeps the lowest id on ties.
pub fn nearest(vector: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(vector, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// k-means++ seeding: the first centroid is uniform, each further one is
/// drawn with probability proportional to its squared distance from the
/// nearest centroid chosen so far.
fn init_plus_plus(vectors: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let mut chosen = vec![false; n];
    let first = rng.random_range(0..n);
    chosen[first] = true;
    let mut centroids = vec![vectors[first].clone()];

    let mut dist: Vec<f64> = vectors
        .iter()
        .map(|v| squared_distance(v, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dist.iter().sum();

        let pick = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, &d) in dist.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                cumulative += d;
                pick = Some(i);
                if cumulative > target {
                    break;
                }
            }
            pick
        } else {
            None
        };

        // Only duplicates left: take the first point not yet used.
        let pick = pick
            .or_else(|| chosen.iter().position(|&c| !c))
            .unwrap_or(0);

        chosen[pick] = true;
        let centroid = vectors[pick].clone();
        for (d, v) in dist.iter_mut().zip(vectors) {
            *d = d.min(squared_distance(v, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Give every empty cluster the point farthest from its current centroid,
/// taken from a cluster that can spare it. Returns true if anything moved.
fn fill_empty_clusters(
    vectors: &[Vec<f64>],
    centroids: &[Vec<f64>],
    assignments: &mut [usize],
    k: usize,
) -> bool {
    let mut sizes = vec![0usize; k];
    for &c in assignments.iter() {
        sizes[c] += 1;
    }

    let mut moved = false;
    for empty in 0..k {
        if sizes[empty] > 0 {
            continue;
        }

        let donor = assignments
            .iter()
            .enumerate()
            .filter(|(_, &c)| sizes[c] > 1)
            .map(|(i, &c)| (i, squared_distance(&vectors[i], &centroids[c])))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });

        if let Some((i, _)) = donor {
            debug!(topic = empty, point = i, "Reseeding empty cluster");
            sizes[assignments[i]] -= 1;
            assignments[i] = empty;
            sizes[empty] = 1;
            moved = true;
        }
    }

    moved
}

fn recompute_centroids(vectors: &[Vec<f64>], assignments: &[usize], k: usize) -> Vec<Vec<f64>> {
    let mut groups: Vec<Vec<&[f64]>> = vec![Vec::new(); k];
    for (v, &c) in vectors.iter().zip(assignments) {
        groups[c].push(v.as_slice());
    }
    groups.iter().map(|g| mean_vector(g)).collect()
}
