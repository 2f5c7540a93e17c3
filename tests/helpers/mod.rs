#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bookvec::db;
use bookvec::embedding::EmbeddingProvider;
use bookvec::error::EmbeddingError;
use bookvec::library::store::store_ebook;
use bookvec::library::types::{Chapter, Ebook};
use bookvec::pipeline::PipelineOptions;
use rusqlite::Connection;
use tempfile::TempDir;

/// A fresh on-disk database in a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn test_db() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("books.db");
    let conn = db::open_database(&path).unwrap();
    db::close_connection(conn).unwrap();
    (tmp, path)
}

/// Store one ebook whose chapters hold the given sentences.
pub fn seed_book(path: &PathBuf, name: &str, chapters: &[&[&str]]) -> i64 {
    let ebook = Ebook {
        title: format!("{name} title"),
        chapters: chapters
            .iter()
            .enumerate()
            .map(|(i, sentences)| Chapter {
                title: format!("Chapter {}", i + 1),
                raw_content: String::new(),
                sentences: sentences.iter().map(|s| s.to_string()).collect(),
            })
            .collect(),
    };
    let mut conn = db::open_database(path).unwrap();
    let result = store_ebook(&mut conn, &ebook, name, |_| {}).unwrap();
    result.ebook_id
}

/// Store `n` sentences in a single chapter: "s1", "s2", ...
pub fn seed_numbered(path: &PathBuf, n: usize) {
    let sentences: Vec<String> = (1..=n).map(|i| format!("s{i}")).collect();
    let refs: Vec<&str> = sentences.iter().map(String::as_str).collect();
    seed_book(path, "numbered", &[&refs]);
}

pub fn open(path: &PathBuf) -> Connection {
    db::open_connection(path).unwrap()
}

pub fn embedding_of(conn: &Connection, sentence_id: i64) -> Option<Vec<u8>> {
    conn.query_row(
        "SELECT embedding FROM sentences WHERE id = ?1",
        [sentence_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn count_embedded(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM sentences WHERE embedding IS NOT NULL",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn test_options(workers: usize) -> PipelineOptions {
    PipelineOptions {
        context_window: 0,
        workers,
        queue_capacity: 4,
        progress_interval: Duration::from_secs(1),
        dimensions: None,
        cancel: None,
    }
}

/// Returns the same vector for every prompt.
pub struct FixedProvider(pub Vec<f32>);

impl EmbeddingProvider for FixedProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }

    fn model(&self) -> &str {
        "fixed"
    }
}

/// Fails for prompts in `failing`, otherwise returns a 3-dim vector.
pub struct FailingProvider {
    pub failing: HashSet<String>,
}

impl EmbeddingProvider for FailingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.failing.contains(text) {
            return Err(EmbeddingError::Service {
                status: 500,
                body: format!("cannot embed {text}"),
            });
        }
        Ok(vec![0.5, 0.5, 0.5])
    }

    fn model(&self) -> &str {
        "failing"
    }
}

/// Records every prompt it sees.
#[derive(Default)]
pub struct RecordingProvider {
    pub seen: Mutex<Vec<String>>,
}

impl EmbeddingProvider for RecordingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(vec![1.0, 0.0])
    }

    fn model(&self) -> &str {
        "recording"
    }
}

/// Sets `cancel` after `after` calls, like a SIGINT arriving mid-run.
pub struct CancellingProvider {
    pub cancel: Arc<AtomicBool>,
    pub after: usize,
    pub calls: Mutex<usize>,
}

impl EmbeddingProvider for CancellingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls >= self.after {
            self.cancel.store(true, Ordering::SeqCst);
        }
        Ok(vec![1.0])
    }

    fn model(&self) -> &str {
        "cancelling"
    }
}
