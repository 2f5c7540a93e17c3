//! EPUB sentence store with a concurrent embedding pipeline.
//!
//! bookvec splits EPUB books into chapters and sentences, stores them in
//! SQLite, and fills in a vector embedding for every sentence by calling a
//! local Ollama-compatible `/api/embeddings` endpoint.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with `ebooks`, `chapters` and `sentences` tables;
//!   embeddings are little-endian `f32` BLOBs on the sentence row
//! - **Embeddings**: blocking HTTP calls, one sentence plus its neighbours per request
//! - **Pipeline**: a worker pool feeding a bounded queue drained by a single writer thread
//! - **Search**: brute-force cosine similarity over stored embeddings
//!
//! # Modules
//!
//! - [`config`] - configuration from TOML and environment variables
//! - [`db`] - connection setup, schema and migrations
//! - [`embedding`] - the provider trait, the HTTP client and vector encoding
//! - [`epub`] - EPUB archives to chapters of sentences
//! - [`library`] - storing books, reading pending sentences, search and stats
//! - [`pipeline`] - the embedding pipeline

pub mod config;
pub mod db;
pub mod embedding;
pub mod epub;
pub mod error;
pub mod library;
pub mod pipeline;
