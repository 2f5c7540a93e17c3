//! SQL DDL for all bookvec tables.
//!
//! Defines the `ebooks`, `chapters`, `sentences` and `schema_meta` tables. All
//! DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the library tables.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS ebooks (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    symbolic_name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS chapters (
    id INTEGER PRIMARY KEY,
    ebook_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    raw_content TEXT NOT NULL,
    FOREIGN KEY (ebook_id) REFERENCES ebooks (id)
);

-- embedding is NULL until the embedding pipeline writes it
CREATE TABLE IF NOT EXISTS sentences (
    id INTEGER PRIMARY KEY,
    chapter_id INTEGER NOT NULL,
    sentence_index INTEGER NOT NULL,
    sentence TEXT NOT NULL,
    embedding BLOB,
    FOREIGN KEY (chapter_id) REFERENCES chapters (id)
);

CREATE INDEX IF NOT EXISTS idx_sentence_index ON sentences (sentence_index);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
