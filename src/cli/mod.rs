pub mod calc_embeddings;
pub mod init_db;
pub mod query;
pub mod stats;
pub mod store_ebook;
