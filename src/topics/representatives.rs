// Representative post selection.
//
// For each topic, the members nearest the topic centroid stand in for the
// whole cluster: they're shown in reports and a couple of them are sent to
// the labeler. Snippets are cut to a fixed character budget to keep prompts
// bounded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::embeddings::{euclidean_distance, mean_vector};
use crate::posts::models::Post;

/// Default number of representatives kept per topic.
pub const DEFAULT_MAX_POSTS: usize = 5;

/// Default snippet length, in characters.
pub const DEFAULT_SNIPPET_CHARS: usize = 300;

/// One representative post: a bounded text snippet and its link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representative {
    pub text: String,
    pub permalink: String,
}

/// Topic id → representatives, ascending by distance to the centroid.
pub type TopicRepresentatives = BTreeMap<usize, Vec<Representative>>;

/// How to pick and render representatives.
#[derive(Debug, Clone)]
pub struct SelectionParams {
    pub max_posts: usize,
    pub snippet_chars: usize,
    /// Prefix for site-relative permalinks.
    pub permalink_base: String,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            max_posts: DEFAULT_MAX_POSTS,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
            permalink_base: "https://reddit.com".to_string(),
        }
    }
}

/// Select up to `max_posts` representatives for one topic.
///
/// `assignments`, `vectors` and `posts` are parallel slices. The centroid is
/// recomputed from the members' vectors; members are ranked by ascending
/// Euclidean distance to it (stable, so equal distances keep input order).
/// A topic with no members yields an empty list.
pub fn select(
    topic_id: usize,
    assignments: &[usize],
    vectors: &[Vec<f64>],
    posts: &[Post],
    params: &SelectionParams,
) -> Vec<Representative> {
    let members: Vec<usize> = assignments
        .iter()
        .enumerate()
        .filter(|(_, &t)| t == topic_id)
        .map(|(i, _)| i)
        .filter(|&i| i < vectors.len() && i < posts.len())
        .collect();

    if members.is_empty() {
        return Vec::new();
    }

    let member_vectors: Vec<&[f64]> = members.iter().map(|&i| vectors[i].as_slice()).collect();
    let centroid = mean_vector(&member_vectors);

    let mut ranked: Vec<(usize, f64)> = members
        .iter()
        .map(|&i| (i, euclidean_distance(&vectors[i], &centroid)))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    ranked
        .into_iter()
        .take(params.max_posts)
        .map(|(i, _)| Representative {
            text: snippet(&posts[i].text, params.snippet_chars),
            permalink: posts[i].absolute_permalink(&params.permalink_base),
        })
        .collect()
}

/// Select representatives for every topic id in `[0, k)`.
pub fn select_all(
    k: usize,
    assignments: &[usize],
    vectors: &[Vec<f64>],
    posts: &[Post],
    params: &SelectionParams,
) -> TopicRepresentatives {
    (0..k)
        .map(|topic| (topic, select(topic, assignments, vectors, posts, params)))
        .collect()
}

/// First `max_chars` characters of `text`. Never longer than the budget and
/// never splits a multi-byte character.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
