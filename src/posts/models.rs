// Post data structures.
//
// RawPost mirrors what the scraper writes to disk: every field is optional
// because listing endpoints omit empty bodies and older dumps lack some
// columns. Post is the cleaned record the pipeline works with.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Language tag for posts whose text is empty or undetectable.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// A post exactly as delivered by the scraper or seeding export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub selftext: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
}

/// A post ready for clustering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    /// Zero-based ordinal of the record in the input file.
    pub id: usize,
    pub title: String,
    pub selftext: String,
    /// Title and body joined by a single space. Never null.
    pub text: String,
    pub permalink: String,
    pub created_utc: Option<f64>,
    pub subreddit: Option<String>,
    pub upvote_ratio: Option<f64>,
    /// ISO 639-1 code, or `"unknown"` until the language filter runs.
    pub language: String,
}

impl Post {
    /// Build a post from a raw record. The permalink is the only required
    /// field; everything else degrades to an empty string or `None`.
    pub fn from_raw(id: usize, raw: RawPost) -> Result<Self, PipelineError> {
        let permalink = raw
            .permalink
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PipelineError::input(format!("record {id} has no permalink")))?;

        let title = raw.title.unwrap_or_default();
        let selftext = raw.selftext.unwrap_or_default();
        let text = format!("{title} {selftext}");

        Ok(Self {
            id,
            title,
            selftext,
            text,
            permalink,
            created_utc: raw.created_utc,
            subreddit: raw.subreddit.filter(|s| !s.is_empty()),
            upvote_ratio: raw.upvote_ratio,
            language: UNKNOWN_LANGUAGE.to_string(),
        })
    }

    /// Convenience constructor for posts built in code rather than loaded.
    pub fn new(id: usize, title: &str, selftext: &str, permalink: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            selftext: selftext.to_string(),
            text: format!("{title} {selftext}"),
            permalink: permalink.to_string(),
            created_utc: None,
            subreddit: None,
            upvote_ratio: None,
            language: UNKNOWN_LANGUAGE.to_string(),
        }
    }

    /// Render the permalink as an absolute URL. Scraped permalinks are
    /// site-relative (`/r/delhi/comments/...`), so they get `base` prepended.
    pub fn absolute_permalink(&self, base: &str) -> String {
        if self.permalink.starts_with('/') {
            format!("{}{}", base.trim_end_matches('/'), self.permalink)
        } else {
            self.permalink.clone()
        }
    }
}
