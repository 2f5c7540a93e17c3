//! CLI `store-ebook` command: read an EPUB and store its sentences.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use bookvec::config::BookvecConfig;
use bookvec::db;
use bookvec::epub;
use bookvec::library::store;

pub fn store_ebook(config: &BookvecConfig, epub_path: &Path, symbolic_name: &str) -> Result<()> {
    let ebook = epub::read_epub(epub_path)
        .with_context(|| format!("failed to read {}", epub_path.display()))?;

    let db_path = config.resolved_db_path();
    let mut conn = db::open_database(&db_path).context("failed to open database")?;

    println!(
        "Storing '{}' as '{symbolic_name}' ({} chapters)...",
        ebook.title,
        ebook.chapters.len()
    );

    let pb = ProgressBar::new(ebook.chapters.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} chapters ({eta})")?
            .progress_chars("##-"),
    );

    let result = store::store_ebook(&mut conn, &ebook, symbolic_name, |_| pb.inc(1));
    pb.finish_and_clear();
    let result = result?;
    db::close_connection(conn)?;

    println!(
        "Stored {} sentences in {} chapters (ebook id {}).",
        result.sentences, result.chapters, result.ebook_id
    );
    Ok(())
}
