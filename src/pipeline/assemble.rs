// Result assembly: join per-post topic ids with topic labels.
//
// Produces the two artifacts the storage collaborators consume: every post
// with its `topic` and `topic_label`, and the topic → representatives map.
// A topic without a label gets `None`, never a missing field.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Serialize, Serializer};

use crate::error::PipelineError;
use crate::labeler::LabelOutcome;
use crate::posts::models::Post;
use crate::topics::normalizer::Normalized;
use crate::topics::representatives::TopicRepresentatives;

/// A post plus its topic assignment, flat enough for a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugmentedPost {
    pub id: usize,
    pub title: String,
    pub selftext: String,
    pub text: String,
    pub permalink: String,
    pub created_utc: Option<f64>,
    /// `created_utc` rendered as RFC 3339.
    pub created_at: Option<String>,
    pub subreddit: Option<String>,
    pub upvote_ratio: Option<f64>,
    pub language: String,
    #[serde(serialize_with = "join_pipe")]
    pub tokens: Vec<String>,
    #[serde(serialize_with = "join_pipe")]
    pub entities: Vec<String>,
    pub topic: usize,
    pub topic_label: Option<String>,
}

impl AugmentedPost {
    fn new(post: &Post, topic: usize, topic_label: Option<String>) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            selftext: post.selftext.clone(),
            text: post.text.clone(),
            permalink: post.permalink.clone(),
            created_utc: post.created_utc,
            created_at: post.created_utc.and_then(format_timestamp),
            subreddit: post.subreddit.clone(),
            upvote_ratio: post.upvote_ratio,
            language: post.language.clone(),
            tokens: Vec::new(),
            entities: Vec::new(),
            topic,
            topic_label,
        }
    }
}

/// Both output artifacts of a run.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub posts: Vec<AugmentedPost>,
    pub representatives: TopicRepresentatives,
}

/// Join posts, their topic ids, and topic labels.
///
/// `posts` and `topic_ids` are parallel. Topics missing from `labels` leave
/// `topic_label` as `None` for every member.
pub fn assemble(
    posts: &[Post],
    topic_ids: &[usize],
    labels: &BTreeMap<usize, String>,
    representatives: TopicRepresentatives,
) -> Result<Assembly, PipelineError> {
    if posts.len() != topic_ids.len() {
        return Err(PipelineError::input(format!(
            "{} posts but {} topic assignments",
            posts.len(),
            topic_ids.len()
        )));
    }

    let posts = posts
        .iter()
        .zip(topic_ids)
        .map(|(post, &topic)| AugmentedPost::new(post, topic, labels.get(&topic).cloned()))
        .collect();

    Ok(Assembly {
        posts,
        representatives,
    })
}

/// Attach normalizer output to assembled posts, by position.
pub fn attach_normalized(posts: &mut [AugmentedPost], normalized: Vec<Normalized>) {
    for (post, n) in posts.iter_mut().zip(normalized) {
        post.tokens = n.tokens;
        post.entities = n.entities;
    }
}

/// Keep only the topics that actually got a label.
pub fn labels_from_outcomes(outcomes: &BTreeMap<usize, LabelOutcome>) -> BTreeMap<usize, String> {
    outcomes
        .iter()
        .filter_map(|(&topic, outcome)| outcome.label().map(|l| (topic, l.to_string())))
        .collect()
}

fn format_timestamp(secs: f64) -> Option<String> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0).map(|dt| dt.to_rfc3339())
}

fn join_pipe<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&values.join("|"))
}
