use anyhow::Result;

use bookvec::config::BookvecConfig;
use bookvec::library::stats::library_stats;

/// Display library statistics in the terminal.
pub fn stats(config: &BookvecConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = bookvec::db::open_database(&db_path)?;

    let stats = library_stats(&conn, Some(&db_path))?;

    println!("Library Statistics");
    println!("{}", "=".repeat(40));
    println!("  Ebooks:              {}", stats.ebooks);
    println!("  Chapters:            {}", stats.chapters);
    println!("  Sentences:           {}", stats.sentences);
    println!("  Embedded:            {}", stats.embedded);
    println!("  Pending:             {}", stats.pending);
    println!();

    if !stats.by_ebook.is_empty() {
        println!("By Ebook:");
        for book in &stats.by_ebook {
            println!(
                "  {:<20} {:>6} chapters {:>8} sentences {:>8} embedded  {}",
                book.symbolic_name, book.chapters, book.sentences, book.embedded, book.title
            );
        }
        println!();
    }

    if let Some(ref model) = stats.embedding_model {
        match stats.embedding_dimensions {
            Some(dims) => println!("Embedding model:       {model} ({dims} dims)"),
            None => println!("Embedding model:       {model}"),
        }
    }
    println!("Schema version:        {}", stats.schema_version);
    println!("Database size:         {} bytes", stats.db_size_bytes);

    bookvec::db::close_connection(conn)?;
    Ok(())
}
