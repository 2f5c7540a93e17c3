use anyhow::{Context, Result};

use bookvec::config::BookvecConfig;
use bookvec::db;

/// Create the database file and schema, or bring an existing one up to date.
pub fn init_db(config: &BookvecConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)
        .with_context(|| format!("failed to initialise {}", db_path.display()))?;
    let version = db::migrations::get_schema_version(&conn)?;
    db::close_connection(conn)?;

    println!("Database ready at {} (schema v{version})", db_path.display());
    Ok(())
}
