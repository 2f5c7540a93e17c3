//! Row source for the embedding pipeline.
//!
//! Streams sentences whose `embedding` is still NULL, in ascending `id` order,
//! with the context window computed by the same statement. Rows are stepped
//! from the SQLite cursor one at a time; nothing is materialized up front.

use rusqlite::{params, Connection, Row, Statement};

use crate::library::types::Sentence;

const PENDING_SQL: &str = "
SELECT s.id, s.chapter_id, s.sentence_index, s.sentence,
       (SELECT group_concat(c.sentence, ' ' ORDER BY c.sentence_index)
          FROM sentences c
         WHERE c.chapter_id = s.chapter_id
           AND c.sentence_index BETWEEN s.sentence_index - ?1 AND s.sentence_index + ?1)
  FROM sentences s
 WHERE s.embedding IS NULL
 ORDER BY s.id";

/// Read side of the pipeline. Borrows a connection; never writes.
pub struct RowSource<'conn> {
    conn: &'conn Connection,
    window: usize,
}

impl<'conn> RowSource<'conn> {
    pub fn new(conn: &'conn Connection, window: usize) -> Self {
        Self { conn, window }
    }

    /// Number of sentences with a NULL embedding.
    pub fn total_pending(&self) -> rusqlite::Result<u64> {
        total_pending(self.conn)
    }

    /// Prepare the streaming query. Iterate with [`PendingRows::iter`].
    pub fn pending_rows(&self) -> rusqlite::Result<PendingRows<'conn>> {
        let stmt = self.conn.prepare(PENDING_SQL)?;
        Ok(PendingRows {
            stmt,
            window: i64::try_from(self.window).unwrap_or(i64::MAX / 2),
        })
    }
}

/// A prepared cursor over pending sentences. Single consumer.
pub struct PendingRows<'conn> {
    stmt: Statement<'conn>,
    window: i64,
}

impl PendingRows<'_> {
    /// Step through the pending rows lazily.
    pub fn iter(&mut self) -> rusqlite::Result<impl Iterator<Item = rusqlite::Result<Sentence>> + '_> {
        self.stmt.query_map(params![self.window], map_pending)
    }
}

fn map_pending(row: &Row<'_>) -> rusqlite::Result<Sentence> {
    let text: String = row.get(3)?;
    let context: Option<String> = row.get(4)?;
    Ok(Sentence {
        id: row.get(0)?,
        chapter_id: row.get(1)?,
        sentence_index: row.get(2)?,
        context_text: context.unwrap_or_else(|| text.clone()),
        text,
        embedding: None,
    })
}

/// Number of sentences with a NULL embedding.
pub fn total_pending(conn: &Connection) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sentences WHERE embedding IS NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Write one embedding. Used only by the pipeline's writer thread.
pub fn update_embedding(conn: &Connection, sentence_id: i64, blob: &[u8]) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sentences SET embedding = ?1 WHERE id = ?2",
        params![blob, sentence_id],
    )
}
