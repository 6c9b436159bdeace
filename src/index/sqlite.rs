//! SQLite index implementation
//!
//! This module provides a SQLite-based implementation of the Index trait.
//! One database holds any number of named indexes.

use crate::index::schema::initialize_schema;
use crate::index::{Document, Index, IndexError, IndexResult, Update};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared SQLite database backing one or more indexes
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> IndexResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> IndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Returns a handle to the index called `name`
    pub fn index(&self, name: &str) -> SqliteIndex {
        SqliteIndex {
            db: self.clone(),
            name: name.to_string(),
        }
    }

    /// Counts documents per index name
    pub fn counts(&self) -> IndexResult<Vec<(String, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT index_name, COUNT(*) FROM documents GROUP BY index_name ORDER BY index_name",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn lock(&self) -> IndexResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| IndexError::Database("connection lock poisoned".to_string()))
    }
}

/// A named index stored in a `SqliteDatabase`
#[derive(Clone)]
pub struct SqliteIndex {
    db: SqliteDatabase,
    name: String,
}

impl SqliteIndex {
    /// Returns the full stored document, if any
    pub fn get_document(&self, id: &str) -> IndexResult<Option<Value>> {
        let conn = self.db.lock()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE index_name = ?1 AND id = ?2",
                params![self.name, id],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Counts documents in this index
    pub fn count(&self) -> IndexResult<u64> {
        let conn = self.db.lock()?;
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE index_name = ?1",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Keeps only the requested top-level fields of a JSON object
fn project(body: Value, fields: &[&str]) -> Value {
    if fields.is_empty() {
        return body;
    }

    match body {
        Value::Object(mut map) => {
            let projected: Map<String, Value> = fields
                .iter()
                .filter_map(|field| map.remove(*field).map(|v| (field.to_string(), v)))
                .collect();
            Value::Object(projected)
        }
        other => other,
    }
}

#[async_trait]
impl Index for SqliteIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn index(&self, id: &str, doc: &Document) -> IndexResult<()> {
        let body = serde_json::to_string(doc)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO documents (index_name, id, body, indexed_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(index_name, id) DO UPDATE SET body = excluded.body,
             indexed_at = excluded.indexed_at, updated_at = NULL",
            params![self.name, id, body, now],
        )?;

        tracing::debug!(index = %self.name, cid = id, "Indexed document");
        Ok(())
    }

    async fn update(&self, id: &str, update: &Update) -> IndexResult<()> {
        let conn = self.db.lock()?;

        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE index_name = ?1 AND id = ?2",
                params![self.name, id],
                |row| row.get(0),
            )
            .optional()?;

        let body = body.ok_or_else(|| IndexError::NotFound(format!("{}/{}", self.name, id)))?;

        let mut doc: Value = serde_json::from_str(&body)?;
        if let (Value::Object(target), Value::Object(fields)) =
            (&mut doc, serde_json::to_value(update)?)
        {
            target.extend(fields);
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2 WHERE index_name = ?3 AND id = ?4",
            params![serde_json::to_string(&doc)?, now, self.name, id],
        )?;

        tracing::debug!(index = %self.name, cid = id, "Updated document");
        Ok(())
    }

    async fn delete(&self, id: &str) -> IndexResult<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "DELETE FROM documents WHERE index_name = ?1 AND id = ?2",
            params![self.name, id],
        )?;

        tracing::debug!(index = %self.name, cid = id, "Deleted document");
        Ok(())
    }

    async fn get(&self, id: &str, fields: &[&str]) -> IndexResult<Option<Value>> {
        Ok(self.get_document(id)?.map(|body| project(body, fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Common, File, IndexedReference, Invalid};
    use crate::types::{AnnotatedResource, Resource, ResourceType, Stat};

    fn file_document(size: u64) -> Document {
        let r = AnnotatedResource::new(Resource::ipfs("QmFile"))
            .with_stat(Stat::new(ResourceType::File, size));
        Document::File(File::new(Common::for_resource(&r)))
    }

    #[tokio::test]
    async fn test_index_and_get() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let files = db.index("files");

        files.index("QmFile", &file_document(15)).await.unwrap();

        let fields = files.get("QmFile", &["size"]).await.unwrap().unwrap();
        assert_eq!(fields, serde_json::json!({"size": 15}));
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let files = db.index("files");

        assert!(files.get("QmMissing", &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_indexes_are_separate() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let files = db.index("files");
        let invalids = db.index("invalids");

        invalids
            .index(
                "QmBad",
                &Document::Invalid(Invalid {
                    error: "unsupported type".to_string(),
                }),
            )
            .await
            .unwrap();

        assert!(files.get("QmBad", &[]).await.unwrap().is_none());
        assert!(invalids.get("QmBad", &[]).await.unwrap().is_some());
        assert_eq!(invalids.count().unwrap(), 1);
        assert_eq!(files.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let files = db.index("files");
        files.index("QmFile", &file_document(15)).await.unwrap();

        let refs = vec![IndexedReference {
            parent_hash: "QmParent".to_string(),
            name: "a.pdf".to_string(),
        }];
        files
            .update(
                "QmFile",
                &Update {
                    last_seen: None,
                    references: Some(refs),
                },
            )
            .await
            .unwrap();

        let doc = files.get_document("QmFile").unwrap().unwrap();
        assert_eq!(doc["size"], 15);
        assert_eq!(doc["references"][0]["parent_hash"], "QmParent");
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let files = db.index("files");

        let result = files.update("QmMissing", &Update::default()).await;
        assert!(matches!(result, Err(IndexError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let files = db.index("files");
        files.index("QmFile", &file_document(15)).await.unwrap();

        files.delete("QmFile").await.unwrap();

        assert!(files.get("QmFile", &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counts_per_index() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.index("files")
            .index("QmA", &file_document(1))
            .await
            .unwrap();
        db.index("files")
            .index("QmB", &file_document(2))
            .await
            .unwrap();
        db.index("partials")
            .index("QmC", &Document::Partial(Default::default()))
            .await
            .unwrap();

        let counts = db.counts().unwrap();
        assert_eq!(
            counts,
            vec![("files".to_string(), 2), ("partials".to_string(), 1)]
        );
    }

    #[test]
    fn test_project_skips_missing_fields() {
        let body = serde_json::json!({"size": 1, "references": []});
        let projected = project(body, &["references", "last-seen"]);
        assert_eq!(projected, serde_json::json!({"references": []}));
    }
}
