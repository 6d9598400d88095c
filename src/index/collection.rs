//! SQLite-backed named-collection vector index.
//!
//! One SQLite file holds many collections; each index generation writes
//! its chunks under a fresh collection name derived from the topic and a
//! millisecond timestamp, so concurrent or sequential rebuilds never
//! corrupt or blend with a prior generation's rows. Search is brute-force
//! cosine over the rows of this handle's own collection only.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};

use super::{collection_name, IndexEntry, ScoredChunk, VectorIndex};

/// Handle onto one collection (one index generation) in the SQLite store.
pub struct CollectionIndex {
    pool: SqlitePool,
    collection: String,
    len: usize,
}

impl CollectionIndex {
    /// Create a fresh collection for `topic` and insert all entries.
    pub async fn create(db_path: &Path, topic: &str, entries: Vec<IndexEntry>) -> Result<Self> {
        let pool = connect(db_path).await?;
        migrate(&pool).await?;

        let collection = collection_name(topic);
        let now = chrono::Utc::now().timestamp();

        let mut tx = pool.begin().await?;
        sqlx::query("INSERT INTO collections (name, topic, created_at) VALUES (?, ?, ?)")
            .bind(&collection)
            .bind(topic)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        for entry in &entries {
            sqlx::query(
                "INSERT INTO chunks (id, collection, text, source, vector) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&collection)
            .bind(&entry.text)
            .bind(&entry.source)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(Self {
            pool,
            collection,
            len: entries.len(),
        })
    }

    /// The unique collection name backing this generation.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorIndex for CollectionIndex {
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows: Vec<(String, String, Vec<u8>)> =
            sqlx::query_as("SELECT text, source, vector FROM chunks WHERE collection = ?")
                .bind(&self.collection)
                .fetch_all(&self.pool)
                .await?;

        let mut scored: Vec<ScoredChunk> = rows
            .into_iter()
            .map(|(text, source, blob)| ScoredChunk {
                score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                text,
                source,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn len(&self) -> usize {
        self.len
    }
}

async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            topic TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL REFERENCES collections(name),
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            vector BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
        .execute(pool)
        .await?;

    Ok(())
}
