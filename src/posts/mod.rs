// Post records handed over by the scraping collaborator, and the loader
// that turns a JSON or CSV dump into clean in-memory posts.

pub mod loader;
pub mod models;
