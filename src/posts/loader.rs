// Load scraped posts from disk.
//
// The scraper dumps a JSON array per subreddit/listing, the seeding export
// writes CSV with the same column names. Both land here. A bad record is
// logged and skipped; only an unreadable file fails the load.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::models::{Post, RawPost};

/// Posts that survived loading plus a count of the records that didn't.
#[derive(Debug, Default)]
pub struct LoadedPosts {
    pub posts: Vec<Post>,
    pub skipped: usize,
}

impl LoadedPosts {
    /// Convert raw records into posts, skipping the ones without the
    /// required fields. Ids are the record ordinals, so skipped records
    /// leave gaps rather than shifting later ids.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (usize, Result<RawPost, String>)>,
    {
        let mut loaded = Self::default();

        for (id, record) in records {
            let post = record
                .map_err(crate::error::PipelineError::Input)
                .and_then(|raw| Post::from_raw(id, raw));

            match post {
                Ok(post) => loaded.posts.push(post),
                Err(e) => {
                    warn!(record = id, error = %e, "Skipping malformed post");
                    loaded.skipped += 1;
                }
            }
        }

        loaded
    }
}

/// Load posts from a `.csv` or JSON file, picked by extension.
pub fn load_posts(path: &Path) -> Result<LoadedPosts> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let loaded = if is_csv {
        load_csv(path)?
    } else {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_json(&json).with_context(|| format!("Failed to parse {}", path.display()))?
    };

    info!(
        path = %path.display(),
        loaded = loaded.posts.len(),
        skipped = loaded.skipped,
        "Loaded posts"
    );

    Ok(loaded)
}

/// Parse a JSON array of post objects. Each element is decoded on its own
/// so one wrongly-typed field only costs that record.
pub fn parse_json(json: &str) -> Result<LoadedPosts> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).context("Expected a JSON array of post objects")?;

    Ok(LoadedPosts::from_records(
        values.into_iter().enumerate().map(|(i, value)| {
            (
                i,
                serde_json::from_value::<RawPost>(value).map_err(|e| e.to_string()),
            )
        }),
    ))
}

fn load_csv(path: &Path) -> Result<LoadedPosts> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let records: Vec<(usize, Result<RawPost, String>)> = reader
        .deserialize::<RawPost>()
        .enumerate()
        .map(|(i, row)| (i, row.map_err(|e| e.to_string())))
        .collect();

    Ok(LoadedPosts::from_records(records))
}
