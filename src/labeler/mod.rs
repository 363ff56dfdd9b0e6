// Topic labeling: turn each topic's representative posts into a short
// human-readable name using a generative language service.
//
// The TextGenerator trait hides the service. GeminiClient implements it;
// retry/backoff and call pacing wrap whatever implementation is plugged in.

pub mod gemini;
pub mod pacer;
pub mod retry;
pub mod traits;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::topics::representatives::{Representative, TopicRepresentatives};
use pacer::Pacer;
use retry::{with_backoff, LabelError, RetryPolicy};
use traits::TextGenerator;

/// Default number of representative texts sent per label call.
pub const DEFAULT_SAMPLE_SIZE: usize = 2;

/// Default gap between consecutive label calls.
pub const DEFAULT_INTER_CALL_DELAY: Duration = Duration::from_secs(5);

/// What to do when a topic's label call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFailurePolicy {
    /// Record the failure, leave the topic unlabeled, move on.
    Skip,
    /// Stop labeling and fail the run.
    Abort,
}

/// Result of labeling one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    Labeled(String),
    Failed(LabelError),
    /// No members, so nothing to send.
    EmptyTopic,
}

impl LabelOutcome {
    pub fn label(&self) -> Option<&str> {
        match self {
            LabelOutcome::Labeled(label) => Some(label),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabelerSettings {
    pub sample_size: usize,
    pub retry: RetryPolicy,
    pub inter_call_delay: Duration,
    pub failure_policy: LabelFailurePolicy,
    /// How the prompt describes the corpus, e.g. "Reddit posts from Delhi".
    pub corpus_description: String,
}

impl Default for LabelerSettings {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            retry: RetryPolicy::default(),
            inter_call_delay: DEFAULT_INTER_CALL_DELAY,
            failure_policy: LabelFailurePolicy::Skip,
            corpus_description: "Reddit posts".to_string(),
        }
    }
}

pub struct TopicLabeler {
    generator: Arc<dyn TextGenerator>,
    settings: LabelerSettings,
    pacer: Pacer,
}

impl TopicLabeler {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: LabelerSettings) -> Self {
        let pacer = Pacer::new(settings.inter_call_delay);
        Self {
            generator,
            settings,
            pacer,
        }
    }

    pub fn settings(&self) -> &LabelerSettings {
        &self.settings
    }

    /// Label one topic from its sample texts.
    ///
    /// Only the first `sample_size` texts are sent. Rate limits are retried
    /// with backoff; the whole call (retries included) is paced against the
    /// previous one.
    pub async fn label(&self, topic_id: usize, texts: &[String]) -> Result<String, LabelError> {
        let sample = &texts[..texts.len().min(self.settings.sample_size)];
        let prompt = build_prompt(&self.settings.corpus_description, topic_id, sample);
        let generator = Arc::clone(&self.generator);

        let response = self
            .pacer
            .run(with_backoff(&self.settings.retry, || {
                let generator = Arc::clone(&generator);
                let prompt = prompt.clone();
                async move { generator.generate(&prompt).await }
            }))
            .await?;

        Ok(response.trim().to_string())
    }

    /// Label every topic in ascending id order.
    ///
    /// Under `Skip`, failed topics come back as `LabelOutcome::Failed` and
    /// the loop continues. Under `Abort`, the first failure ends the run.
    pub async fn label_all(
        &self,
        representatives: &TopicRepresentatives,
    ) -> Result<BTreeMap<usize, LabelOutcome>, PipelineError> {
        let pb = ProgressBar::new(representatives.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Labeling [{bar:40.cyan/blue}] {pos}/{len} topics")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        info!(
            topics = representatives.len(),
            worst_case_backoff = ?self.settings.retry.total_backoff(),
            "Labeling topics"
        );

        let mut outcomes = BTreeMap::new();

        for (&topic, reps) in representatives {
            let outcome = if reps.is_empty() {
                warn!(topic, "Topic has no members, not labeling");
                LabelOutcome::EmptyTopic
            } else {
                let texts = sample_texts(reps);
                match self.label(topic, &texts).await {
                    Ok(label) => {
                        info!(topic, label = %label, "Labeled topic");
                        LabelOutcome::Labeled(label)
                    }
                    Err(e) => {
                        warn!(topic, error = %e, "Failed to label topic");
                        if self.settings.failure_policy == LabelFailurePolicy::Abort {
                            pb.abandon();
                            return Err(label_error_for_topic(topic, e));
                        }
                        LabelOutcome::Failed(e)
                    }
                }
            };

            outcomes.insert(topic, outcome);
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(outcomes)
    }
}

fn sample_texts(reps: &[Representative]) -> Vec<String> {
    reps.iter().map(|r| r.text.clone()).collect()
}

/// Lift a per-topic label failure into the run-level error taxonomy.
pub fn label_error_for_topic(topic: usize, err: LabelError) -> PipelineError {
    match err {
        LabelError::RateLimited { attempts, last } => PipelineError::RateLimit {
            topic,
            attempts,
            last,
        },
        LabelError::Service(message) => PipelineError::ExternalService { topic, message },
    }
}

/// Prompt asking for a 2-5 word topic name. Only snippet text is sent,
/// never permalinks or other metadata.
pub fn build_prompt(corpus_description: &str, topic_id: usize, texts: &[String]) -> String {
    let formatted: Vec<String> = texts.iter().map(|t| format!("- {t}")).collect();

    format!(
        "You are analyzing {corpus_description}.\n\
         Here are some example posts from cluster {topic_id}:\n\
         \n\
         {}\n\
         \n\
         Please give a short, human-readable topic name (2-5 words). \
         Reply with the name only.",
        formatted.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use traits::GenerationError;

    /// Records prompts, answers from a fixed script of results.
    struct ScriptedGenerator {
        script: Mutex<Vec<Result<String, GenerationError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(mut script: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                script: Mutex::new(script),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(GenerationError::Failed("script exhausted".into())))
        }
    }

    fn rep(text: &str) -> Representative {
        Representative {
            text: text.to_string(),
            permalink: format!("https://reddit.com/r/t/{}", text.len()),
        }
    }

    fn fast_settings() -> LabelerSettings {
        LabelerSettings {
            inter_call_delay: Duration::from_secs(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_prompt_lists_texts_and_topic() {
        let prompt = build_prompt(
            "Reddit posts from Delhi",
            3,
            &["Metro is late".to_string(), "Blue line stuck".to_string()],
        );
        assert!(prompt.contains("Reddit posts from Delhi"));
        assert!(prompt.contains("cluster 3"));
        assert!(prompt.contains("- Metro is late\n- Blue line stuck"));
        assert!(prompt.contains("2-5 words"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_label_trims_and_caps_sample() {
        let generator = ScriptedGenerator::new(vec![Ok("  Metro Delays \n".into())]);
        let labeler = TopicLabeler::new(generator.clone(), fast_settings());

        let texts = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        let label = labeler.label(0, &texts).await.unwrap();

        assert_eq!(label, "Metro Delays");
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- first"));
        assert!(prompts[0].contains("- second"));
        assert!(!prompts[0].contains("- third"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_label_all_skips_failures_and_empty_topics() {
        let generator = ScriptedGenerator::new(vec![
            Ok("Air Pollution".into()),
            Err(GenerationError::Failed("403 Forbidden".into())),
        ]);
        let labeler = TopicLabeler::new(generator.clone(), fast_settings());

        let mut reps = TopicRepresentatives::new();
        reps.insert(0, vec![rep("smog everywhere")]);
        reps.insert(1, vec![]);
        reps.insert(2, vec![rep("api key broke")]);

        let outcomes = labeler.label_all(&reps).await.unwrap();
        assert_eq!(outcomes[&0], LabelOutcome::Labeled("Air Pollution".into()));
        assert_eq!(outcomes[&1], LabelOutcome::EmptyTopic);
        assert!(matches!(
            outcomes[&2],
            LabelOutcome::Failed(LabelError::Service(_))
        ));
        // The empty topic never reaches the service.
        assert_eq!(generator.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_label_all_abort_policy_stops_at_first_failure() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Failed("500".into())),
            Ok("never used".into()),
        ]);
        let labeler = TopicLabeler::new(
            generator.clone(),
            LabelerSettings {
                failure_policy: LabelFailurePolicy::Abort,
                ..fast_settings()
            },
        );

        let mut reps = TopicRepresentatives::new();
        reps.insert(0, vec![rep("a")]);
        reps.insert(1, vec![rep("b")]);

        let err = labeler.label_all(&reps).await.unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { topic: 0, .. }));
        assert_eq!(generator.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_label_all_spaces_calls_by_inter_call_delay() {
        let generator = ScriptedGenerator::new(vec![
            Ok("One".into()),
            Err(GenerationError::Failed("boom".into())),
            Ok("Three".into()),
        ]);
        let labeler = TopicLabeler::new(generator, fast_settings());

        let mut reps = TopicRepresentatives::new();
        for topic in 0..3 {
            reps.insert(topic, vec![rep("text")]);
        }

        let start = tokio::time::Instant::now();
        labeler.label_all(&reps).await.unwrap();
        // Two gaps of 5s between three calls, failure or not.
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_label_error_for_topic_maps_variants() {
        let err = label_error_for_topic(
            4,
            LabelError::RateLimited {
                attempts: 5,
                last: "429".into(),
            },
        );
        assert!(matches!(
            err,
            PipelineError::RateLimit {
                topic: 4,
                attempts: 5,
                ..
            }
        ));
    }
}
