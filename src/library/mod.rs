//! Ebook library storage: the ebook write path, the pending-sentence row
//! source, similarity search and statistics.

pub mod search;
pub mod sentences;
pub mod stats;
pub mod store;
pub mod types;
