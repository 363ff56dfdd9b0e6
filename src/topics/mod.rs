// Topic discovery: sentence embeddings, k-means clustering, representative
// selection, and the auxiliary token/keyword extraction used for reporting.

pub mod download;
pub mod embeddings;
pub mod keywords;
pub mod kmeans;
pub mod normalizer;
pub mod representatives;
pub mod traits;
