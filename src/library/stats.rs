use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

use crate::db::migrations;

/// Per-ebook counts.
#[derive(Debug, Serialize)]
pub struct EbookStats {
    pub symbolic_name: String,
    pub title: String,
    pub chapters: u64,
    pub sentences: u64,
    pub embedded: u64,
}

/// Response from library_stats.
#[derive(Debug, Serialize)]
pub struct LibraryStats {
    pub ebooks: u64,
    pub chapters: u64,
    pub sentences: u64,
    pub embedded: u64,
    pub pending: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimensions: Option<usize>,
    pub schema_version: u32,
    pub db_size_bytes: u64,
    pub by_ebook: Vec<EbookStats>,
}

/// Compute library statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn library_stats(conn: &Connection, db_path: Option<&Path>) -> Result<LibraryStats> {
    let count = |sql: &str| -> rusqlite::Result<u64> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0)).map(|n| n as u64)
    };

    let ebooks = count("SELECT COUNT(*) FROM ebooks")?;
    let chapters = count("SELECT COUNT(*) FROM chapters")?;
    // Both counts from one statement so they share a snapshot.
    let (sentences, embedded) = conn.query_row(
        "SELECT COUNT(*), COUNT(embedding) FROM sentences",
        [],
        |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
    )?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(LibraryStats {
        ebooks,
        chapters,
        sentences,
        embedded,
        pending: sentences.saturating_sub(embedded),
        embedding_model: migrations::get_embedding_model(conn)?,
        embedding_dimensions: migrations::get_embedding_dimensions(conn)?,
        schema_version: migrations::get_schema_version(conn)?,
        db_size_bytes,
        by_ebook: count_by_ebook(conn)?,
    })
}

fn count_by_ebook(conn: &Connection) -> Result<Vec<EbookStats>> {
    let mut stmt = conn.prepare(
        "SELECT e.symbolic_name, e.title,
                (SELECT COUNT(*) FROM chapters c WHERE c.ebook_id = e.id),
                COUNT(s.id),
                COUNT(s.embedding)
           FROM ebooks e
           LEFT JOIN chapters c ON c.ebook_id = e.id
           LEFT JOIN sentences s ON s.chapter_id = c.id
          GROUP BY e.id
          ORDER BY e.symbolic_name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(EbookStats {
                symbolic_name: row.get(0)?,
                title: row.get(1)?,
                chapters: row.get::<_, i64>(2)? as u64,
                sentences: row.get::<_, i64>(3)? as u64,
                embedded: row.get::<_, i64>(4)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
