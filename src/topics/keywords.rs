// TF-IDF keywords per topic.
//
// Uses the `keyword_extraction` crate over each topic's member posts, each
// post a separate document: words every member uses get downweighted,
// distinctive ones boosted. The keywords go into the run summary so a topic
// is still recognizable when its label call failed.

use std::collections::BTreeMap;

use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};
use stop_words::{get, LANGUAGE};
use tracing::debug;

use crate::posts::models::Post;

/// Default number of keywords reported per topic.
pub const DEFAULT_TOP_KEYWORDS: usize = 5;

/// Top `top_n` TF-IDF keywords across a set of texts, best first.
pub fn top_keywords(texts: &[String], top_n: usize) -> Vec<String> {
    if texts.iter().all(|t| t.trim().is_empty()) || top_n == 0 {
        return Vec::new();
    }

    let stop_words: Vec<String> = get(LANGUAGE::English);
    let params = TfIdfParams::UnprocessedDocuments(texts, &stop_words, None);
    let tfidf = TfIdf::new(params);

    tfidf
        .get_ranked_word_scores(top_n)
        .into_iter()
        .map(|(word, _)| word)
        .collect()
}

/// Keywords for every topic id in `[0, k)`. Empty topics get no keywords.
pub fn keywords_by_topic(
    k: usize,
    assignments: &[usize],
    posts: &[Post],
    top_n: usize,
) -> BTreeMap<usize, Vec<String>> {
    let mut texts: Vec<Vec<String>> = vec![Vec::new(); k];
    for (post, &topic) in posts.iter().zip(assignments) {
        if let Some(bucket) = texts.get_mut(topic) {
            bucket.push(post.text.clone());
        }
    }

    texts
        .into_iter()
        .enumerate()
        .map(|(topic, member_texts)| {
            let keywords = top_keywords(&member_texts, top_n);
            debug!(topic, keywords = ?keywords, "Topic keywords");
            (topic, keywords)
        })
        .collect()
}
