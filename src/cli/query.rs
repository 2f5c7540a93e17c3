use anyhow::{Context, Result};

use bookvec::config::BookvecConfig;
use bookvec::db;
use bookvec::embedding::{EmbeddingProvider, OllamaEmbedder, QUERY_PREFIX};
use bookvec::library::search::search_sentences;

/// Print the `n_results` stored sentences closest to `text`.
pub fn query(config: &BookvecConfig, text: &str, n_results: usize) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path).context("failed to open database")?;

    if let Some(stored) = db::migrations::get_embedding_model(&conn)? {
        if stored != config.embedding.model {
            tracing::warn!(
                stored = %stored,
                configured = %config.embedding.model,
                "query model differs from the model that produced stored embeddings"
            );
        }
    }

    let provider = OllamaEmbedder::new(&config.embedding)?;
    let query_embedding = provider
        .embed(&format!("{QUERY_PREFIX}{text}"))
        .context("failed to embed query")?;

    let results = search_sentences(&conn, &query_embedding, n_results)?;
    db::close_connection(conn)?;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "  {}. [{} / {}] {} (score: {:.4})",
            i + 1,
            result.ebook,
            result.chapter,
            result.sentence,
            result.score
        );
    }
    Ok(())
}
