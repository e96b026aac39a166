//! SQLite-backed vector partitions scoped to `(user_id, thread_id)`.
//!
//! Each partition is the ordered sequence of chunk rows for one thread;
//! a chunk's position in that sequence is its identity (append-only, no
//! deletion). Chunk text, document metadata, and the embedding live in the
//! same row and every upload commits in a single transaction, so the vector
//! data and its metadata cannot diverge on a partial write.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use sahay_types::DocumentInfo;

use crate::search::rank_by_distance;

/// Default number of nearest neighbors retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Blocking task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Vector count {vectors} does not match chunk count {chunks}")]
    LengthMismatch { vectors: usize, chunks: usize },
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// One retrieved chunk, with its ranking distance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub text: String,
    pub doc_id: String,
    pub filename: String,
    pub distance: f32,
}

/// Partitioned vector store over SQLite.
pub struct VectorStore {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
        doc_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        thread_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        chunk_count INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        user_id TEXT NOT NULL,
        thread_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        doc_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (user_id, thread_id, position)
    );";

impl VectorStore {
    /// Open (or create) the vector store at the given path. `dimensions` is
    /// fixed for the lifetime of the store and every vector written or
    /// queried must match it.
    pub fn open(path: &Path, dimensions: usize) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!(
            "Vector store opened: {} (dimensions={dimensions})",
            path.display()
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Append a document's chunks and vectors to a thread's partition.
    ///
    /// The partition is created implicitly on first write. All chunk rows and
    /// the document registry row commit in one transaction. Repeated uploads
    /// of the same content are appended again; no deduplication is attempted.
    pub async fn add_document(
        &self,
        user_id: &str,
        thread_id: &str,
        doc_id: &str,
        embeddings: &[Vec<f32>],
        chunks: &[String],
        filename: &str,
    ) -> Result<String> {
        if embeddings.len() != chunks.len() {
            return Err(RetrievalError::LengthMismatch {
                vectors: embeddings.len(),
                chunks: chunks.len(),
            });
        }
        for embedding in embeddings {
            if embedding.len() != self.dimensions {
                return Err(RetrievalError::DimensionMismatch {
                    expected: self.dimensions,
                    got: embedding.len(),
                });
            }
        }

        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        let thread_id = thread_id.to_string();
        let doc_id = doc_id.to_string();
        let filename = filename.to_string();
        let rows: Vec<(String, Vec<u8>)> = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(text, embedding)| (text.clone(), embedding_to_bytes(embedding)))
            .collect();
        let now = chrono::Utc::now().timestamp_millis();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;

            let next_position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM chunks
                 WHERE user_id = ?1 AND thread_id = ?2",
                rusqlite::params![user_id, thread_id],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO documents (doc_id, user_id, thread_id, filename, chunk_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![doc_id, user_id, thread_id, filename, rows.len() as i64, now],
            )?;

            for (offset, (text, embedding)) in rows.iter().enumerate() {
                tx.execute(
                    "INSERT INTO chunks (user_id, thread_id, position, doc_id, filename, text, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        user_id,
                        thread_id,
                        next_position + offset as i64,
                        doc_id,
                        filename,
                        text,
                        embedding,
                    ],
                )?;
            }

            tx.commit()?;
            tracing::debug!(
                "Added {} chunks for doc {doc_id} to partition {user_id}/{thread_id}",
                rows.len()
            );
            Ok(doc_id)
        })
        .await?
    }

    /// Search a thread's partition for the chunks nearest to `query`, in
    /// ascending squared-L2 distance order.
    ///
    /// A partition that does not exist yields an empty result, not an error.
    /// When `doc_id` is given, filtering happens after the `top_k` nearest
    /// neighbors are taken from the whole partition, so a narrow filter can
    /// return fewer than `top_k` hits even when more matching chunks exist
    /// further away. Callers that need k hits from one document must raise
    /// `top_k` instead.
    pub async fn search(
        &self,
        user_id: &str,
        thread_id: &str,
        query: &[f32],
        doc_id: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        let thread_id = thread_id.to_string();
        let doc_filter = doc_id.map(String::from);
        let query = query.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT doc_id, filename, text, embedding FROM chunks
                 WHERE user_id = ?1 AND thread_id = ?2 ORDER BY position",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, thread_id], |row| {
                    let embedding_bytes: Vec<u8> = row.get(3)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        bytes_to_embedding(&embedding_bytes),
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if rows.is_empty() {
                return Ok(Vec::new());
            }

            let vectors: Vec<Vec<f32>> = rows.iter().map(|(_, _, _, v)| v.clone()).collect();
            let ranked = rank_by_distance(&query, &vectors, top_k);

            let mut hits = Vec::new();
            for (idx, distance) in ranked {
                let (doc_id, filename, text, _) = &rows[idx];
                if let Some(filter) = &doc_filter {
                    if doc_id != filter {
                        continue;
                    }
                }
                hits.push(SearchHit {
                    text: text.clone(),
                    doc_id: doc_id.clone(),
                    filename: filename.clone(),
                    distance,
                });
            }
            Ok(hits)
        })
        .await?
    }

    /// List a user's uploaded documents, most recent first.
    pub async fn list_documents(&self, user_id: &str) -> Result<Vec<DocumentInfo>> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT doc_id, user_id, thread_id, filename, chunk_count, created_at
                 FROM documents WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| {
                    Ok(DocumentInfo {
                        doc_id: row.get(0)?,
                        user_id: row.get(1)?,
                        thread_id: row.get(2)?,
                        filename: row.get(3)?,
                        chunk_count: row.get::<_, i64>(4)? as usize,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VectorStore {
        VectorStore::open_in_memory(3).unwrap()
    }

    async fn add(
        store: &VectorStore,
        user: &str,
        thread: &str,
        doc: &str,
        vectors: &[[f32; 3]],
        texts: &[&str],
    ) {
        let embeddings: Vec<Vec<f32>> = vectors.iter().map(|v| v.to_vec()).collect();
        let chunks: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        store
            .add_document(user, thread, doc, &embeddings, &chunks, "test.txt")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_search_returns_all_in_distance_order() {
        let store = store();
        add(
            &store,
            "u1",
            "t1",
            "d1",
            &[[10.0, 0.0, 0.0], [1.0, 0.0, 0.0], [5.0, 0.0, 0.0]],
            &["far", "near", "mid"],
        )
        .await;

        let hits = store
            .search("u1", "t1", &[0.0, 0.0, 0.0], None, 10)
            .await
            .unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid", "far"]);
        assert!(hits[0].distance < hits[1].distance);
    }

    #[tokio::test]
    async fn test_nearest_chunk_wins_with_top_k_one() {
        let store = store();
        add(
            &store,
            "u1",
            "t1",
            "d1",
            &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            &["first", "second", "third"],
        )
        .await;

        let hits = store
            .search("u1", "t1", &[0.0, 0.9, 0.1], None, 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "second");
    }

    #[tokio::test]
    async fn test_partition_isolation() {
        let store = store();
        add(&store, "u1", "t1", "d1", &[[1.0, 0.0, 0.0]], &["mine"]).await;

        // Same user, different thread
        let hits = store
            .search("u1", "t2", &[1.0, 0.0, 0.0], None, 5)
            .await
            .unwrap();
        assert!(hits.is_empty());

        // Same thread id, different user
        let hits = store
            .search("u2", "t1", &[1.0, 0.0, 0.0], None, 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_missing_partition_is_empty_not_error() {
        let store = store();
        let hits = store
            .search("nobody", "nothing", &[0.0, 0.0, 0.0], None, 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_doc_filter_applies_after_ranking() {
        let store = store();
        add(&store, "u1", "t1", "d1", &[[1.0, 0.0, 0.0]], &["from d1"]).await;
        add(&store, "u1", "t1", "d2", &[[1.1, 0.0, 0.0]], &["from d2"]).await;

        // Both chunks are within the top 2; only one survives the filter.
        let hits = store
            .search("u1", "t1", &[1.0, 0.0, 0.0], Some("d2"), 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "from d2");
    }

    #[tokio::test]
    async fn test_doc_filter_can_under_return() {
        let store = store();
        // d2's chunk is far from the query, outside top_k=1
        add(&store, "u1", "t1", "d1", &[[0.0, 0.0, 0.0]], &["near d1"]).await;
        add(&store, "u1", "t1", "d2", &[[9.0, 9.0, 9.0]], &["far d2"]).await;

        let hits = store
            .search("u1", "t1", &[0.0, 0.0, 0.0], Some("d2"), 1)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_appends_preserve_positions_across_documents() {
        let store = store();
        add(&store, "u1", "t1", "d1", &[[0.0, 0.0, 1.0]], &["one"]).await;
        add(&store, "u1", "t1", "d2", &[[0.0, 0.0, 2.0]], &["two"]).await;

        let hits = store
            .search("u1", "t1", &[0.0, 0.0, 0.0], None, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "one");
    }

    #[tokio::test]
    async fn test_length_mismatch_rejected() {
        let store = store();
        let err = store
            .add_document(
                "u1",
                "t1",
                "d1",
                &[vec![0.0, 0.0, 0.0]],
                &["a".into(), "b".into()],
                "f.txt",
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::LengthMismatch {
                vectors: 1,
                chunks: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = store();
        let err = store
            .add_document("u1", "t1", "d1", &[vec![0.0, 0.0]], &["a".into()], "f.txt")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        ));

        let err = store
            .search("u1", "t1", &[0.0; 4], None, 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 3,
                got: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_reopen_preserves_partition() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("vectors.db");

        {
            let store = VectorStore::open(&db_path, 3).unwrap();
            add(&store, "u1", "t1", "d1", &[[1.0, 0.0, 0.0]], &["kept"]).await;
        }

        let store = VectorStore::open(&db_path, 3).unwrap();
        let hits = store
            .search("u1", "t1", &[1.0, 0.0, 0.0], None, 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "kept");
    }

    #[tokio::test]
    async fn test_list_documents() {
        let store = store();
        add(&store, "u1", "t1", "d1", &[[0.0, 0.0, 0.0]], &["x"]).await;
        add(&store, "u1", "t2", "d2", &[[0.0, 0.0, 0.0]], &["y"]).await;
        add(&store, "u2", "t1", "d3", &[[0.0, 0.0, 0.0]], &["z"]).await;

        let docs = store.list_documents("u1").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].doc_id, "d2");
        assert_eq!(docs[0].chunk_count, 1);
    }
}
