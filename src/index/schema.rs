//! Database schema definitions
//!
//! All logical indexes share one table; documents are JSON bodies keyed by
//! index name and resource id.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    index_name TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    indexed_at TEXT NOT NULL,
    updated_at TEXT,
    PRIMARY KEY (index_name, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_index ON documents(index_name);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
