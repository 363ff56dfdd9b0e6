// End-to-end run: filter → encode → cluster → select → label → assemble.
//
// Every stage but labeling is pure given its inputs, so two runs with the
// same posts, settings and seed produce the same topics and representatives.
// The normalizer runs alongside but never influences clustering.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::assemble::{assemble, attach_normalized, labels_from_outcomes, Assembly};
use super::summary::{summarize, TopicSummary};
use crate::config::PipelineSettings;
use crate::error::PipelineError;
use crate::labeler::{LabelOutcome, TopicLabeler};
use crate::language::LanguageFilter;
use crate::posts::models::Post;
use crate::topics::embeddings::encode;
use crate::topics::keywords::keywords_by_topic;
use crate::topics::kmeans::KMeans;
use crate::topics::normalizer::normalize;
use crate::topics::representatives::select_all;
use crate::topics::traits::TextEmbedder;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub input_posts: usize,
    pub kept_posts: usize,
    pub topics: usize,
    pub labeled_topics: usize,
    pub kmeans_iterations: usize,
    pub inertia: f64,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub assembly: Assembly,
    pub outcomes: BTreeMap<usize, LabelOutcome>,
    pub summary: Vec<TopicSummary>,
    pub stats: RunStats,
}

pub struct Pipeline {
    settings: PipelineSettings,
    filter: LanguageFilter,
    embedder: Arc<dyn TextEmbedder>,
    labeler: TopicLabeler,
}

impl Pipeline {
    /// Validates settings up front so a bad K or language code fails before
    /// any post is touched.
    pub fn new(
        settings: PipelineSettings,
        embedder: Arc<dyn TextEmbedder>,
        labeler: TopicLabeler,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;
        crate::config::validate_labeler(labeler.settings())?;
        let filter = LanguageFilter::new(&settings.target_language)?;

        Ok(Self {
            settings,
            filter,
            embedder,
            labeler,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every stage over one batch of posts.
    pub async fn run(&self, posts: Vec<Post>) -> Result<RunOutput, PipelineError> {
        let input_posts = posts.len();
        let k = self.settings.num_topics;

        let kept = self.filter.filter(posts);
        if kept.len() < k {
            return Err(PipelineError::configuration(format!(
                "{} posts remain after language filtering, fewer than the {k} requested topics",
                kept.len()
            )));
        }

        let texts: Vec<String> = kept.iter().map(|p| p.text.clone()).collect();
        let vectors = encode(self.embedder.as_ref(), &texts, self.settings.embed_batch_size).await?;

        let clustering = KMeans::fit(
            &vectors,
            k,
            self.settings.seed,
            self.settings.max_iterations,
        )?;

        let representatives = select_all(
            k,
            &clustering.assignments,
            &vectors,
            &kept,
            &self.settings.selection,
        );

        let outcomes = self.labeler.label_all(&representatives).await?;
        let labels = labels_from_outcomes(&outcomes);

        let mut assembly = assemble(&kept, &clustering.assignments, &labels, representatives)?;
        if self.settings.extract_tokens {
            let normalized = kept.iter().map(|p| normalize(&p.text)).collect();
            attach_normalized(&mut assembly.posts, normalized);
        }

        let keywords = keywords_by_topic(
            k,
            &clustering.assignments,
            &kept,
            self.settings.top_keywords,
        );
        let summary = summarize(&clustering.sizes(), &outcomes, &keywords);

        let stats = RunStats {
            input_posts,
            kept_posts: kept.len(),
            topics: k,
            labeled_topics: labels.len(),
            kmeans_iterations: clustering.iterations,
            inertia: clustering.inertia,
        };

        info!(
            input = stats.input_posts,
            kept = stats.kept_posts,
            topics = stats.topics,
            labeled = stats.labeled_topics,
            "Pipeline run complete"
        );

        Ok(RunOutput {
            assembly,
            outcomes,
            summary,
            stats,
        })
    }
}
