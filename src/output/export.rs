// File exports for a finished run.
//
// The augmented posts go to CSV, one row per post, with an empty
// `topic_label` cell for unlabeled topics. Representatives and the run
// summary go to pretty JSON. Topic ids are integers in memory; JSON object
// keys are strings on disk and parse back into `usize`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::pipeline::assemble::AugmentedPost;
use crate::pipeline::summary::TopicSummary;
use crate::topics::representatives::TopicRepresentatives;

pub const POSTS_FILE: &str = "posts_with_topics.csv";
pub const REPRESENTATIVES_FILE: &str = "topic_representatives.json";
pub const SUMMARY_FILE: &str = "topic_summary.json";

pub fn write_augmented_csv(path: &Path, posts: &[AugmentedPost]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for post in posts {
        writer
            .serialize(post)
            .with_context(|| format!("Failed to write post {} to CSV", post.id))?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = posts.len(), "Wrote augmented posts");
    Ok(())
}

pub fn write_representatives_json(path: &Path, representatives: &TopicRepresentatives) -> Result<()> {
    write_pretty_json(path, representatives)?;
    info!(path = %path.display(), topics = representatives.len(), "Wrote topic representatives");
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &[TopicSummary]) -> Result<()> {
    write_pretty_json(path, summary)?;
    info!(path = %path.display(), topics = summary.len(), "Wrote run summary");
    Ok(())
}

fn write_pretty_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
