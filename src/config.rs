use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

use crate::error::PipelineError;
use crate::labeler::retry::RetryPolicy;
use crate::labeler::{gemini, LabelFailurePolicy, LabelerSettings};
use crate::language::parse_language;
use crate::topics::keywords::DEFAULT_TOP_KEYWORDS;
use crate::topics::kmeans::DEFAULT_MAX_ITERATIONS;
use crate::topics::representatives::SelectionParams;

/// Settings for the clustering half of a run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// ISO 639-1 code posts must be written in.
    pub target_language: String,
    /// Number of topics K.
    pub num_topics: usize,
    /// Seed for k-means initialization.
    pub seed: u64,
    pub max_iterations: usize,
    pub selection: SelectionParams,
    /// Texts per embedding model call.
    pub embed_batch_size: usize,
    /// Run the token/entity extractor for the export.
    pub extract_tokens: bool,
    /// Keywords per topic in the run summary.
    pub top_keywords: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_language: "en".to_string(),
            num_topics: 15,
            seed: 42,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            selection: SelectionParams::default(),
            embed_batch_size: 32,
            extract_tokens: true,
            top_keywords: DEFAULT_TOP_KEYWORDS,
        }
    }
}

impl PipelineSettings {
    /// Reject settings that can't produce a run. Checked before any work starts.
    pub fn validate(&self) -> Result<(), PipelineError> {
        parse_language(&self.target_language)?;
        if self.num_topics == 0 {
            return Err(PipelineError::configuration("number of topics must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(PipelineError::configuration("max iterations must be at least 1"));
        }
        if self.selection.max_posts == 0 {
            return Err(PipelineError::configuration(
                "max representatives per topic must be at least 1",
            ));
        }
        if self.selection.snippet_chars == 0 {
            return Err(PipelineError::configuration("snippet budget must be at least 1 character"));
        }
        if self.embed_batch_size == 0 {
            return Err(PipelineError::configuration("embedding batch size must be at least 1"));
        }
        Ok(())
    }
}

/// Reject labeler settings that would never send a useful request.
pub fn validate_labeler(settings: &LabelerSettings) -> Result<(), PipelineError> {
    if settings.sample_size == 0 {
        return Err(PipelineError::configuration("label sample size must be at least 1"));
    }
    if settings.retry.max_attempts == 0 {
        return Err(PipelineError::configuration("label attempts must be at least 1"));
    }
    Ok(())
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub pipeline: PipelineSettings,
    pub labeler: LabelerSettings,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_url: String,
    /// Directory containing the ONNX model files
    pub model_dir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables take their defaults; set-but-unparseable ones are a
    /// configuration error rather than a silent fallback.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PipelineSettings::default();
        let default_selection = SelectionParams::default();
        let default_labeler = LabelerSettings::default();

        let selection = SelectionParams {
            max_posts: parse_or(&lookup, "TOPICLENS_MAX_REPRESENTATIVES", default_selection.max_posts)?,
            snippet_chars: parse_or(&lookup, "TOPICLENS_SNIPPET_CHARS", default_selection.snippet_chars)?,
            permalink_base: lookup("TOPICLENS_PERMALINK_BASE")
                .unwrap_or(default_selection.permalink_base),
        };

        let pipeline = PipelineSettings {
            target_language: lookup("TOPICLENS_TARGET_LANGUAGE").unwrap_or(defaults.target_language),
            num_topics: parse_or(&lookup, "TOPICLENS_NUM_TOPICS", defaults.num_topics)?,
            seed: parse_or(&lookup, "TOPICLENS_SEED", defaults.seed)?,
            max_iterations: parse_or(&lookup, "TOPICLENS_MAX_ITERATIONS", defaults.max_iterations)?,
            selection,
            embed_batch_size: parse_or(&lookup, "TOPICLENS_EMBED_BATCH", defaults.embed_batch_size)?,
            extract_tokens: parse_or(&lookup, "TOPICLENS_EXTRACT_TOKENS", defaults.extract_tokens)?,
            top_keywords: defaults.top_keywords,
        };

        let failure_policy = match lookup("TOPICLENS_ON_LABEL_FAILURE").as_deref() {
            None | Some("skip") => LabelFailurePolicy::Skip,
            Some("abort") => LabelFailurePolicy::Abort,
            Some(other) => {
                return Err(PipelineError::configuration(format!(
                    "TOPICLENS_ON_LABEL_FAILURE must be 'skip' or 'abort', got '{other}'"
                ))
                .into())
            }
        };

        let labeler = LabelerSettings {
            sample_size: parse_or(&lookup, "TOPICLENS_LABEL_SAMPLE_SIZE", default_labeler.sample_size)?,
            retry: RetryPolicy {
                max_attempts: parse_or(
                    &lookup,
                    "TOPICLENS_LABEL_MAX_ATTEMPTS",
                    default_labeler.retry.max_attempts,
                )?,
                base_delay: parse_secs_or(
                    &lookup,
                    "TOPICLENS_LABEL_BASE_DELAY_SECS",
                    default_labeler.retry.base_delay,
                )?,
            },
            inter_call_delay: parse_secs_or(
                &lookup,
                "TOPICLENS_LABEL_INTER_CALL_DELAY_SECS",
                default_labeler.inter_call_delay,
            )?,
            failure_policy,
            corpus_description: lookup("TOPICLENS_CORPUS_DESCRIPTION")
                .unwrap_or(default_labeler.corpus_description),
        };

        let model_dir = lookup("TOPICLENS_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(crate::topics::download::default_model_dir);

        Ok(Self {
            pipeline,
            labeler,
            gemini_api_key: lookup("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            gemini_api_url: lookup("GEMINI_API_URL")
                .unwrap_or_else(|| gemini::DEFAULT_API_URL.to_string()),
            model_dir,
        })
    }

    /// Validate every setting a `run` depends on.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.pipeline.validate()?;
        validate_labeler(&self.labeler)
    }

    /// Check that the Gemini API key is configured.
    /// Call this before any operation that labels topics.
    pub fn require_gemini(&self) -> Result<()> {
        if self.gemini_api_key.is_empty() {
            anyhow::bail!(
                "GEMINI_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the embedding model has been downloaded.
    pub fn require_embedding_model(&self) -> Result<()> {
        if !crate::topics::download::embedding_files_present(&self.model_dir) {
            anyhow::bail!(
                "Embedding model files not found in {}\n\
                 Run `topiclens download-model` to download them.",
                self.model_dir.display()
            );
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            PipelineError::configuration(format!("{name} has an invalid value '{raw}'"))
        }),
    }
}

/// Seconds as a (possibly fractional) number. Negative or non-finite values
/// are rejected.
fn parse_secs_or<F>(lookup: &F, name: &str, default: Duration) -> Result<Duration, PipelineError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: f64 = parse_or(lookup, name, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs).map_err(|_| {
        PipelineError::configuration(format!("{name} must be a non-negative number of seconds"))
    })
}
