// Language filter: keep only posts written in the target language.
//
// Detection uses lingua's n-gram models, which are deterministic, so the
// same input always yields the same retained set. Empty text never reaches
// the detector and is tagged "unknown".

use std::str::FromStr;

use lingua::{IsoCode639_1, Language, LanguageDetector, LanguageDetectorBuilder};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::posts::models::{Post, UNKNOWN_LANGUAGE};

pub struct LanguageFilter {
    detector: LanguageDetector,
    target_code: String,
}

impl LanguageFilter {
    /// Build a filter for an ISO 639-1 code such as `"en"`.
    pub fn new(target_code: &str) -> Result<Self, PipelineError> {
        let target = parse_language(target_code)?;
        let detector = LanguageDetectorBuilder::from_all_languages().build();

        Ok(Self {
            detector,
            target_code: target.iso_code_639_1().to_string(),
        })
    }

    pub fn target_code(&self) -> &str {
        &self.target_code
    }

    /// Classify one text, returning its ISO 639-1 code or `"unknown"`.
    pub fn classify(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return UNKNOWN_LANGUAGE.to_string();
        }

        match self.detector.detect_language_of(trimmed) {
            Some(language) => language.iso_code_639_1().to_string(),
            None => UNKNOWN_LANGUAGE.to_string(),
        }
    }

    /// Tag every post with its language and keep the target-language ones.
    /// Dropped posts are not retried.
    pub fn filter(&self, posts: Vec<Post>) -> Vec<Post> {
        let total = posts.len();

        let kept: Vec<Post> = posts
            .into_iter()
            .filter_map(|mut post| {
                post.language = self.classify(&post.text);
                if post.language == self.target_code {
                    Some(post)
                } else {
                    debug!(post = post.id, language = %post.language, "Dropping post");
                    None
                }
            })
            .collect();

        info!(
            target = %self.target_code,
            kept = kept.len(),
            dropped = total - kept.len(),
            "Language filter applied"
        );

        kept
    }
}

/// Parse an ISO 639-1 code into a lingua language.
pub fn parse_language(code: &str) -> Result<Language, PipelineError> {
    let iso = IsoCode639_1::from_str(code.trim()).map_err(|_| {
        PipelineError::configuration(format!("unknown target language code '{code}'"))
    })?;
    Ok(Language::from_iso_code_639_1(&iso))
}
