mod helpers;

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use bookvec::db::migrations::{get_embedding_dimensions, get_embedding_model};
use bookvec::error::{EmbeddingError, PipelineError};
use bookvec::pipeline::run_pipeline;
use helpers::*;

#[test]
fn empty_database_completes_immediately() {
    let (_tmp, path) = test_db();
    let report = run_pipeline(&path, &FixedProvider(vec![1.0]), &test_options(2)).unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.written, 0);
    assert!(report.is_success());
    assert!(get_embedding_model(&open(&path)).unwrap().is_none());
}

#[test]
fn single_row_gets_little_endian_blob() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 1);

    let report =
        run_pipeline(&path, &FixedProvider(vec![0.1, 0.2, 0.3]), &test_options(1)).unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.written, 1);

    let mut expected = Vec::new();
    for v in [0.1f32, 0.2, 0.3] {
        expected.extend_from_slice(&v.to_le_bytes());
    }
    let blob = embedding_of(&open(&path), 1).unwrap();
    assert_eq!(blob.len(), 12);
    assert_eq!(blob, expected);
}

#[test]
fn partial_failure_reports_exactly_the_failed_rows() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 10);

    let provider = FailingProvider {
        failing: ["s3", "s6", "s9"].iter().map(|s| s.to_string()).collect(),
    };
    let report = run_pipeline(&path, &provider, &test_options(3)).unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.written, 7);
    assert!(!report.is_success());
    assert!(!report.cancelled);
    assert_eq!(report.failed_ids(), vec![3, 6, 9]);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.error, EmbeddingError::Service { status: 500, .. })));

    let conn = open(&path);
    assert_eq!(count_embedded(&conn), 7);
    for id in [3, 6, 9] {
        assert!(embedding_of(&conn, id).is_none());
    }
}

#[test]
fn rerun_only_touches_rows_still_missing() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 10);

    let failing = FailingProvider {
        failing: ["s2", "s4"].iter().map(|s| s.to_string()).collect(),
    };
    let first = run_pipeline(&path, &failing, &test_options(2)).unwrap();
    assert_eq!(first.written, 8);

    let recorder = RecordingProvider::default();
    let second = run_pipeline(&path, &recorder, &test_options(2)).unwrap();
    assert_eq!(second.total, 2);
    assert_eq!(second.written, 2);
    let mut seen = recorder.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["s2", "s4"]);

    let third = run_pipeline(&path, &recorder, &test_options(2)).unwrap();
    assert_eq!(third.total, 0);
    assert_eq!(third.written, 0);
    assert!(third.is_success());
}

#[test]
fn every_row_is_embedded_at_most_once() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 200);

    let provider = RecordingProvider::default();
    let mut options = test_options(4);
    options.queue_capacity = 1;
    let report = run_pipeline(&path, &provider, &options).unwrap();
    assert_eq!(report.written, 200);

    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen.len(), 200);
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(unique.len(), 200);
    assert_eq!(count_embedded(&open(&path)), 200);
}

#[test]
fn prompts_include_the_context_window() {
    let (_tmp, path) = test_db();
    seed_book(&path, "letters", &[&["A", "B", "C", "D", "E"], &["F", "G"]]);

    let provider = RecordingProvider::default();
    let mut options = test_options(1);
    options.context_window = 1;
    run_pipeline(&path, &provider, &options).unwrap();

    let mut seen = provider.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["A B", "A B C", "B C D", "C D E", "D E", "F G", "F G"]);
}

#[test]
fn records_model_and_dimensions() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 3);

    run_pipeline(&path, &FixedProvider(vec![0.0; 5]), &test_options(2)).unwrap();

    let conn = open(&path);
    assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("fixed"));
    assert_eq!(get_embedding_dimensions(&conn).unwrap(), Some(5));
}

#[test]
fn vectors_of_the_wrong_length_fail_their_rows() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 4);

    let mut options = test_options(2);
    options.dimensions = Some(4);
    let report = run_pipeline(&path, &FixedProvider(vec![1.0; 3]), &options).unwrap();

    assert_eq!(report.written, 0);
    assert_eq!(report.failed_ids(), vec![1, 2, 3, 4]);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f.error, EmbeddingError::Format(_))));
}

#[test]
fn cancellation_stops_dispatch_and_keeps_written_rows() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 50);

    let cancel = Arc::new(AtomicBool::new(false));
    let provider = CancellingProvider {
        cancel: Arc::clone(&cancel),
        after: 3,
        calls: Mutex::new(0),
    };
    let mut options = test_options(1);
    options.cancel = Some(cancel);
    let report = run_pipeline(&path, &provider, &options).unwrap();

    assert!(report.cancelled);
    assert!(!report.is_success());
    assert!(report.written >= 3);
    assert!(report.written < 50);
    assert_eq!(count_embedded(&open(&path)) as u64, report.written);

    let rest = run_pipeline(&path, &FixedProvider(vec![1.0]), &test_options(2)).unwrap();
    assert_eq!(rest.total, 50 - report.written);
    assert!(rest.is_success());
}

#[test]
fn oversized_pool_and_queue_are_clamped() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 5);

    let mut options = test_options(usize::MAX);
    options.queue_capacity = usize::MAX;
    let report = run_pipeline(&path, &FixedProvider(vec![1.0, 2.0]), &options).unwrap();

    assert!(report.is_success());
    assert_eq!(report.written, 5);
    assert_eq!(count_embedded(&open(&path)), 5);
}

#[test]
fn failed_write_aborts_the_run_with_a_storage_error() {
    let (_tmp, path) = test_db();
    seed_numbered(&path, 20);
    open(&path)
        .execute_batch(
            "CREATE TRIGGER reject_embedding BEFORE UPDATE OF embedding ON sentences
             BEGIN SELECT RAISE(ABORT, 'embedding writes disabled'); END;",
        )
        .unwrap();

    let err = run_pipeline(&path, &FixedProvider(vec![1.0]), &test_options(2)).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Storage(_))),
        "unexpected error: {err:#}"
    );
    assert_eq!(count_embedded(&open(&path)), 0);
}

#[test]
fn malformed_schema_aborts_the_run_with_a_storage_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("old.db");
    // A sentences table without an embedding column.
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TABLE sentences (
                 id INTEGER PRIMARY KEY,
                 chapter_id INTEGER NOT NULL,
                 sentence_index INTEGER NOT NULL,
                 sentence TEXT NOT NULL
             );
             INSERT INTO sentences (chapter_id, sentence_index, sentence) VALUES (1, 0, 'x');",
        )
        .unwrap();

    let err = run_pipeline(&path, &FixedProvider(vec![1.0]), &test_options(1)).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Storage(_))),
        "unexpected error: {err:#}"
    );
}
