// Composition tests: the full pipeline wired together.
//
// Language filter -> encoder -> k-means -> representatives -> labeler ->
// assembler, with a synthetic embedder that places each theme at its own
// point and a generator that answers from the prompt text. No network, no
// model files; time is paused so the labeler's pacing is virtual.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use topiclens::config::PipelineSettings;
use topiclens::error::PipelineError;
use topiclens::labeler::traits::{GenerationError, TextGenerator};
use topiclens::labeler::{LabelFailurePolicy, LabelerSettings, TopicLabeler};
use topiclens::pipeline::run::Pipeline;
use topiclens::pipeline::summary::TopicStatus;
use topiclens::posts::models::Post;
use topiclens::topics::traits::TextEmbedder;

// ============================================================
// Fixtures
// ============================================================

const POLLUTION: [&str; 10] = [
    "The smog in the city is terrible this morning and nobody can breathe properly",
    "Air quality index crossed four hundred again, the smog is choking everyone",
    "Schools should stay closed until this smog and pollution finally clear up",
    "My eyes burn every time I step outside because of the smog and the smoke",
    "Why does nobody in the government take the smog problem seriously every winter",
    "Bought an air purifier for the bedroom because the smog is getting worse",
    "Crop burning season means weeks of smog and a horrible cough for my kids",
    "The smog was so thick today that I could not see the building across the road",
    "Doctors are warning that this smog is as bad as smoking a pack of cigarettes",
    "Wearing a mask outside is the only way to deal with this smog right now",
];

const CRICKET: [&str; 10] = [
    "What a cricket match last night, the chase in the final over was incredible",
    "The cricket team needs a better opening pair before the next tournament starts",
    "Anyone want to play cricket in the park this Sunday afternoon with us",
    "That cricket umpire made three terrible decisions in a single afternoon session",
    "Tickets for the cricket test at the stadium sold out within twenty minutes",
    "Our local cricket club is looking for a fast bowler for the summer league",
    "I have been watching cricket highlights all day instead of doing my work",
    "The young cricket captain handled the pressure brilliantly in the last game",
    "Rain ruined the cricket match again, they should really invest in a roof",
    "Best cricket commentary I have ever heard, the crowd was absolutely electric",
];

fn english_posts() -> Vec<Post> {
    POLLUTION
        .iter()
        .chain(CRICKET.iter())
        .enumerate()
        .map(|(i, text)| Post::new(i, text, "", &format!("/r/delhi/comments/{i}")))
        .collect()
}

/// Cricket posts near (0, 10), everything else near (10, 0).
struct ThemeEmbedder {
    calls: AtomicUsize,
}

impl ThemeEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextEmbedder for ThemeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let jitter = (t.len() % 7) as f64 * 0.01;
                if t.contains("cricket") {
                    vec![jitter, 10.0 + jitter]
                } else {
                    vec![10.0 + jitter, jitter]
                }
            })
            .collect())
    }
}

struct BrokenEmbedder;

#[async_trait]
impl TextEmbedder for BrokenEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f64>>> {
        anyhow::bail!("model crashed")
    }
}

/// Names a topic from the prompt text; optionally refuses cricket prompts.
struct ThemeGenerator {
    fail_cricket: bool,
    prompts: Mutex<Vec<String>>,
}

impl ThemeGenerator {
    fn new(fail_cricket: bool) -> Arc<Self> {
        Arc::new(Self {
            fail_cricket,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextGenerator for ThemeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("cricket") {
            if self.fail_cricket {
                return Err(GenerationError::Failed("403 Forbidden".into()));
            }
            Ok("Local Cricket\n".into())
        } else {
            Ok("Air Pollution".into())
        }
    }
}

fn settings(k: usize) -> PipelineSettings {
    PipelineSettings {
        num_topics: k,
        ..Default::default()
    }
}

fn pipeline(
    k: usize,
    embedder: Arc<dyn TextEmbedder>,
    generator: Arc<dyn TextGenerator>,
    failure_policy: LabelFailurePolicy,
) -> Pipeline {
    let labeler = TopicLabeler::new(
        generator,
        LabelerSettings {
            failure_policy,
            ..Default::default()
        },
    );
    Pipeline::new(settings(k), embedder, labeler).unwrap()
}

// ============================================================
// End-to-end: two distinct themes, K = 2
// ============================================================

#[tokio::test(start_paused = true)]
async fn two_themes_are_separated_and_labeled() {
    let generator = ThemeGenerator::new(false);
    let pipeline = pipeline(
        2,
        ThemeEmbedder::new(),
        generator.clone(),
        LabelFailurePolicy::Skip,
    );

    let start = tokio::time::Instant::now();
    let output = pipeline.run(english_posts()).await.unwrap();

    // Two label calls, paced 5s apart.
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(generator.prompts.lock().unwrap().len(), 2);

    assert_eq!(output.stats.input_posts, 20);
    assert_eq!(output.stats.kept_posts, 20);
    assert_eq!(output.stats.labeled_topics, 2);

    let posts = &output.assembly.posts;
    assert_eq!(posts.len(), 20);
    assert!(posts.iter().all(|p| p.language == "en"));

    // Every cricket post shares a topic, every smog post shares the other one.
    let cricket_topic = posts[10].topic;
    let smog_topic = posts[0].topic;
    assert_ne!(cricket_topic, smog_topic);
    for post in posts {
        let expected = if post.text.contains("cricket") {
            cricket_topic
        } else {
            smog_topic
        };
        assert_eq!(post.topic, expected, "post {} misassigned", post.id);
    }

    // Each topic's top representative is on-theme.
    let reps = &output.assembly.representatives;
    assert_eq!(reps.len(), 2);
    assert!(reps[&cricket_topic][0].text.contains("cricket"));
    assert!(reps[&smog_topic][0].text.contains("smog"));
    assert_eq!(reps[&cricket_topic].len(), 5);
    assert!(reps[&smog_topic][0]
        .permalink
        .starts_with("https://reddit.com/r/delhi/comments/"));

    // Labels flow back onto every member, trimmed.
    for post in posts {
        let expected = if post.topic == cricket_topic {
            "Local Cricket"
        } else {
            "Air Pollution"
        };
        assert_eq!(post.topic_label.as_deref(), Some(expected));
    }

    assert!(output
        .summary
        .iter()
        .all(|row| row.status == TopicStatus::Labeled && row.size == 10));
}

#[tokio::test(start_paused = true)]
async fn same_seed_gives_same_topics() {
    let first = pipeline(
        2,
        ThemeEmbedder::new(),
        ThemeGenerator::new(false),
        LabelFailurePolicy::Skip,
    )
    .run(english_posts())
    .await
    .unwrap();
    let second = pipeline(
        2,
        ThemeEmbedder::new(),
        ThemeGenerator::new(false),
        LabelFailurePolicy::Skip,
    )
    .run(english_posts())
    .await
    .unwrap();

    let topics = |posts: &[topiclens::pipeline::assemble::AugmentedPost]| {
        posts.iter().map(|p| p.topic).collect::<Vec<_>>()
    };
    assert_eq!(topics(&first.assembly.posts), topics(&second.assembly.posts));
    assert_eq!(first.assembly.representatives, second.assembly.representatives);
}

// ============================================================
// Language filter feeding the rest
// ============================================================

#[tokio::test(start_paused = true)]
async fn non_target_language_posts_never_reach_clustering() {
    let mut posts = english_posts();
    posts.push(Post::new(
        20,
        "Je suis allé au marché ce matin pour acheter du pain et du fromage",
        "",
        "/r/delhi/comments/20",
    ));
    posts.push(Post::new(
        21,
        "Gestern habe ich den ganzen Tag im Garten gearbeitet und Blumen gepflanzt",
        "",
        "/r/delhi/comments/21",
    ));

    let output = pipeline(
        2,
        ThemeEmbedder::new(),
        ThemeGenerator::new(false),
        LabelFailurePolicy::Skip,
    )
    .run(posts)
    .await
    .unwrap();

    assert_eq!(output.stats.input_posts, 22);
    assert_eq!(output.stats.kept_posts, 20);
    let ids: HashSet<usize> = output.assembly.posts.iter().map(|p| p.id).collect();
    assert!(!ids.contains(&20));
    assert!(!ids.contains(&21));
}

// ============================================================
// Failure handling across the composition
// ============================================================

#[tokio::test(start_paused = true)]
async fn skip_policy_leaves_failed_topic_unlabeled() {
    let output = pipeline(
        2,
        ThemeEmbedder::new(),
        ThemeGenerator::new(true),
        LabelFailurePolicy::Skip,
    )
    .run(english_posts())
    .await
    .unwrap();

    assert_eq!(output.stats.labeled_topics, 1);
    for post in &output.assembly.posts {
        if post.text.contains("cricket") {
            assert_eq!(post.topic_label, None);
        } else {
            assert_eq!(post.topic_label.as_deref(), Some("Air Pollution"));
        }
    }

    let failed: Vec<_> = output
        .summary
        .iter()
        .filter(|row| row.status == TopicStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.as_deref().unwrap().contains("403"));
}

#[tokio::test(start_paused = true)]
async fn abort_policy_fails_the_run() {
    let err = pipeline(
        2,
        ThemeEmbedder::new(),
        ThemeGenerator::new(true),
        LabelFailurePolicy::Abort,
    )
    .run(english_posts())
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::ExternalService { .. }));
}

#[tokio::test]
async fn too_many_topics_fails_before_encoding() {
    let embedder = ThemeEmbedder::new();
    let err = pipeline(
        21,
        embedder.clone(),
        ThemeGenerator::new(false),
        LabelFailurePolicy::Skip,
    )
    .run(english_posts())
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn encoder_failure_is_fatal() {
    let err = pipeline(
        2,
        Arc::new(BrokenEmbedder),
        ThemeGenerator::new(false),
        LabelFailurePolicy::Skip,
    )
    .run(english_posts())
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Encoding(_)));
}

#[test]
fn invalid_language_is_rejected_at_construction() {
    let labeler = TopicLabeler::new(ThemeGenerator::new(false), LabelerSettings::default());
    let result = Pipeline::new(
        PipelineSettings {
            target_language: "zz".into(),
            ..Default::default()
        },
        ThemeEmbedder::new(),
        labeler,
    );
    assert!(matches!(result, Err(PipelineError::Configuration(_))));
}
