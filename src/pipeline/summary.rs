// Per-topic run summary: which topics got a label, which didn't and why.
//
// Printed at the end of every run and written next to the exports, so a
// partial failure can be diagnosed without re-running the pipeline.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::labeler::LabelOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Labeled,
    Failed,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummary {
    pub topic: usize,
    pub size: usize,
    pub status: TopicStatus,
    pub label: Option<String>,
    /// Failure reason when `status` isn't `labeled`.
    pub reason: Option<String>,
    pub keywords: Vec<String>,
}

/// One summary row per topic id in `[0, sizes.len())`.
pub fn summarize(
    sizes: &[usize],
    outcomes: &BTreeMap<usize, LabelOutcome>,
    keywords: &BTreeMap<usize, Vec<String>>,
) -> Vec<TopicSummary> {
    sizes
        .iter()
        .enumerate()
        .map(|(topic, &size)| {
            let (status, label, reason) = match outcomes.get(&topic) {
                Some(LabelOutcome::Labeled(label)) => (TopicStatus::Labeled, Some(label.clone()), None),
                Some(LabelOutcome::Failed(e)) => (TopicStatus::Failed, None, Some(e.to_string())),
                Some(LabelOutcome::EmptyTopic) => {
                    (TopicStatus::Empty, None, Some("empty topic".to_string()))
                }
                None => (TopicStatus::Failed, None, Some("not labeled".to_string())),
            };

            TopicSummary {
                topic,
                size,
                status,
                label,
                reason,
                keywords: keywords.get(&topic).cloned().unwrap_or_default(),
            }
        })
        .collect()
}
