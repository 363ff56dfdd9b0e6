// topiclens: topic clustering and labeling for batches of social media posts.
//
// This is the library root. Each module corresponds to one stage of the
// pipeline or to the plumbing around it.

pub mod config;
pub mod error;
pub mod labeler;
pub mod language;
pub mod output;
pub mod pipeline;
pub mod posts;
pub mod topics;
