//! Record types for the `ebooks`, `chapters` and `sentences` tables.

use serde::Serialize;

/// A parsed ebook, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ebook {
    pub title: String,
    pub chapters: Vec<Chapter>,
}

/// One content document of an ebook, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    /// The XHTML source the sentences were extracted from.
    pub raw_content: String,
    pub sentences: Vec<String>,
}

/// A row of the `sentences` table, enriched with its context window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentence {
    pub id: i64,
    pub chapter_id: i64,
    /// Position within the chapter, starting at 0.
    pub sentence_index: i64,
    pub text: String,
    #[serde(skip)]
    pub embedding: Option<Vec<u8>>,
    /// Space-joined neighbouring sentences of the same chapter. Derived, never stored.
    pub context_text: String,
}
