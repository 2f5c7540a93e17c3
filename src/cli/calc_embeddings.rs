//! CLI `calc-embeddings` command: run the embedding pipeline once.

use anyhow::{bail, Context, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bookvec::config::BookvecConfig;
use bookvec::embedding::OllamaEmbedder;
use bookvec::pipeline::{self, PipelineOptions};
use signal_hook::consts::SIGINT;

pub fn calc_embeddings(config: &BookvecConfig) -> Result<()> {
    let provider = OllamaEmbedder::new(&config.embedding)
        .context("failed to create embedding client")?;

    // First Ctrl-C stops dispatching; a second one exits straight away.
    let cancel = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register_conditional_shutdown(SIGINT, 130, Arc::clone(&cancel))
        .context("failed to install SIGINT handler")?;
    signal_hook::flag::register(SIGINT, Arc::clone(&cancel))
        .context("failed to install SIGINT handler")?;

    let options = PipelineOptions {
        cancel: Some(cancel),
        ..PipelineOptions::from_config(config)
    };

    let db_path = config.resolved_db_path();
    let report = pipeline::run_pipeline(&db_path, &provider, &options)?;

    if report.total == 0 {
        println!("No sentences need embeddings.");
        return Ok(());
    }

    println!(
        "Embedded {}/{} sentences with model '{}'.",
        report.written,
        report.total,
        config.embedding.model
    );

    if !report.failures.is_empty() {
        println!("{} sentences failed:", report.failures.len());
        let mut failures: Vec<_> = report.failures.iter().collect();
        failures.sort_by_key(|f| f.sentence_id);
        for failure in failures {
            println!("  {}: {}", failure.sentence_id, failure.error);
        }
    }

    if report.cancelled {
        bail!("interrupted; run calc-embeddings again to finish the remaining sentences");
    }
    if !report.failures.is_empty() {
        bail!(
            "completed with {} failures; rerun to retry them",
            report.failures.len()
        );
    }
    Ok(())
}
