//! Brute-force cosine similarity search over stored sentence embeddings.

use anyhow::{bail, Result};
use rusqlite::Connection;
use serde::Serialize;

use crate::embedding::{bytes_to_embedding, cosine_similarity};

/// A sentence ranked against a query vector.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub sentence_id: i64,
    pub ebook: String,
    pub chapter: String,
    pub sentence: String,
    pub score: f32,
}

/// Rank every embedded sentence by cosine similarity to `query` and return the
/// best `limit`. Fails if any stored vector has a different length than `query`.
pub fn search_sentences(conn: &Connection, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT s.id, e.symbolic_name, c.title, s.sentence, s.embedding
           FROM sentences s
           JOIN chapters c ON c.id = s.chapter_id
           JOIN ebooks e ON e.id = c.ebook_id
          WHERE s.embedding IS NOT NULL",
    )?;
    let mut rows = stmt.query([])?;

    let mut best: Vec<SearchResult> = Vec::with_capacity(limit.min(1024).saturating_mul(2));
    while let Some(row) = rows.next()? {
        let sentence_id: i64 = row.get(0)?;
        let blob: Vec<u8> = row.get(4)?;
        let vector = bytes_to_embedding(&blob)?;
        if vector.len() != query.len() {
            bail!(
                "sentence {sentence_id} has a {}-dim embedding but the query has {} dims; \
                 re-run calc-embeddings with the stored model",
                vector.len(),
                query.len()
            );
        }

        best.push(SearchResult {
            sentence_id,
            ebook: row.get(1)?,
            chapter: row.get(2)?,
            sentence: row.get(3)?,
            score: cosine_similarity(query, &vector),
        });
        if best.len() >= limit.saturating_mul(2) {
            rank(&mut best, limit);
        }
    }

    rank(&mut best, limit);
    Ok(best)
}

fn rank(results: &mut Vec<SearchResult>, limit: usize) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.sentence_id.cmp(&b.sentence_id))
    });
    results.truncate(limit);
}
