// Colored terminal output for a finished run.
//
// main.rs delegates here after the exports are written: a per-topic table,
// then each topic's label with its representative posts, then a handful of
// labeled posts as a spot check.

use colored::Colorize;

use crate::pipeline::assemble::AugmentedPost;
use crate::pipeline::run::RunStats;
use crate::pipeline::summary::{TopicStatus, TopicSummary};
use crate::topics::representatives::TopicRepresentatives;

/// Display the per-topic summary table.
pub fn display_summary(summary: &[TopicSummary], stats: &RunStats) {
    println!(
        "\n{}",
        format!(
            "=== Topics ({} of {} posts kept, {}/{} labeled) ===",
            stats.kept_posts, stats.input_posts, stats.labeled_topics, stats.topics
        )
        .bold()
    );
    println!();

    println!(
        "  {:>5}  {:>6}  {:<9}  {:<32}  {}",
        "Topic".dimmed(),
        "Posts".dimmed(),
        "Status".dimmed(),
        "Label".dimmed(),
        "Keywords".dimmed(),
    );
    println!("  {}", "-".repeat(78).dimmed());

    for row in summary {
        let label = match (&row.label, &row.reason) {
            (Some(label), _) => label.clone(),
            (None, Some(reason)) => format!("({})", super::truncate_chars(reason, 28)),
            (None, None) => "-".to_string(),
        };

        println!(
            "  {:>5}  {:>6}  {:<9}  {:<32}  {}",
            row.topic,
            row.size,
            colorize_status(row.status),
            label,
            row.keywords.join(", ").dimmed(),
        );
    }

    let failed = summary
        .iter()
        .filter(|r| r.status != TopicStatus::Labeled)
        .count();
    if failed > 0 {
        println!();
        println!("  {} {} topics without a label", "!".yellow(), failed);
    }
}

/// Display each topic's label and representative posts with links.
pub fn display_representatives(summary: &[TopicSummary], representatives: &TopicRepresentatives) {
    println!("\n{}", "=== Representative Posts ===".bold());

    for row in summary {
        let label = row.label.as_deref().unwrap_or("(unlabeled)");
        println!("\n  {} {}", format!("Topic {}:", row.topic).bold(), label.cyan());

        let reps = representatives.get(&row.topic).map(Vec::as_slice).unwrap_or(&[]);
        if reps.is_empty() {
            println!("    {}", "no posts".dimmed());
            continue;
        }

        for (i, rep) in reps.iter().enumerate() {
            let preview = super::truncate_chars(&rep.text, 120);
            println!("    {}. {}", i + 1, preview);
            println!("       {}", rep.permalink.dimmed());
        }
    }
}

/// Display the first `limit` posts with their assigned topics.
pub fn display_sample_posts(posts: &[AugmentedPost], limit: usize) {
    if posts.is_empty() || limit == 0 {
        return;
    }

    println!(
        "\n{}",
        format!("=== Sample ({} of {} posts) ===", limit.min(posts.len()), posts.len()).bold()
    );
    println!();

    for post in posts.iter().take(limit) {
        let label = post.topic_label.as_deref().unwrap_or("-");
        println!(
            "  [{:>2}] {:<28} {}",
            post.topic,
            super::truncate_chars(label, 28).cyan(),
            super::truncate_chars(&post.title, 80).dimmed(),
        );
    }
    println!();
}

fn colorize_status(status: TopicStatus) -> colored::ColoredString {
    match status {
        TopicStatus::Labeled => "labeled".green(),
        TopicStatus::Failed => "failed".red(),
        TopicStatus::Empty => "empty".yellow(),
    }
}
