//! Write path for ingested ebooks.
//!
//! [`store_ebook`] inserts the ebook, its chapters and every sentence inside
//! one transaction, so a failed ingest leaves no partial book behind.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::library::types::Ebook;

/// Result returned from a store operation.
#[derive(Debug, Serialize)]
pub struct StoreEbookResult {
    pub ebook_id: i64,
    pub chapters: usize,
    pub sentences: usize,
}

/// Insert an ebook under a unique symbolic name. `on_chapter` is called after
/// each chapter is written, with the number of sentences it contained.
pub fn store_ebook(
    conn: &mut Connection,
    ebook: &Ebook,
    symbolic_name: &str,
    mut on_chapter: impl FnMut(usize),
) -> Result<StoreEbookResult> {
    if ebook_id_by_name(conn, symbolic_name)?.is_some() {
        bail!("an ebook named '{symbolic_name}' is already stored");
    }

    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO ebooks (title, symbolic_name) VALUES (?1, ?2)",
        params![ebook.title, symbolic_name],
    )
    .context("failed to insert ebook")?;
    let ebook_id = tx.last_insert_rowid();

    let mut sentences = 0usize;
    {
        let mut chapter_stmt = tx.prepare(
            "INSERT INTO chapters (ebook_id, title, raw_content) VALUES (?1, ?2, ?3)",
        )?;
        let mut sentence_stmt = tx.prepare(
            "INSERT INTO sentences (chapter_id, sentence_index, sentence) VALUES (?1, ?2, ?3)",
        )?;

        for chapter in &ebook.chapters {
            let chapter_id =
                chapter_stmt.insert(params![ebook_id, chapter.title, chapter.raw_content])?;
            for (index, sentence) in chapter.sentences.iter().enumerate() {
                sentence_stmt.execute(params![chapter_id, index as i64, sentence])?;
            }
            sentences += chapter.sentences.len();
            on_chapter(chapter.sentences.len());
        }
    }

    tx.commit()?;

    tracing::info!(
        ebook_id,
        symbolic_name,
        chapters = ebook.chapters.len(),
        sentences,
        "ebook stored"
    );

    Ok(StoreEbookResult {
        ebook_id,
        chapters: ebook.chapters.len(),
        sentences,
    })
}

/// Look up an ebook id by its symbolic name.
pub fn ebook_id_by_name(conn: &Connection, symbolic_name: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM ebooks WHERE symbolic_name = ?1",
            [symbolic_name],
            |row| row.get(0),
        )
        .optional()?)
}
