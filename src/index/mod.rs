//! Per-topic vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the similarity-search capability each
//! topic's [`DocumentProcessor`](crate::processor::DocumentProcessor) owns.
//! Two backends implement it:
//!
//! - [`memory::FlatIndex`] — in-process brute-force store, cosine ranked.
//! - [`collection::CollectionIndex`] — SQLite-backed named-collection store;
//!   every rebuild writes into a fresh, uniquely named collection so
//!   generations never blend.
//!
//! Backends are selected once from configuration via [`IndexBackend`] and
//! produce immutable index handles: a rebuild constructs a whole new handle
//! which the processor swaps in atomically.

pub mod collection;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// A chunk ready for indexing: text, originating file, embedding vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub text: String,
    pub source: String,
    pub vector: Vec<f32>,
}

/// A retrieved chunk with its similarity score (cosine, higher is better).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Similarity-search capability over one generation of indexed chunks.
///
/// An index may be empty; `search` on an empty index answers with an
/// empty result set rather than an error.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `k` chunks ordered best first.
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of chunks in this index generation.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index backend selection, resolved once at topic construction.
#[derive(Debug, Clone)]
pub enum IndexBackend {
    /// In-process flat store.
    Memory,
    /// Persistent named-collection store in a SQLite file.
    Sqlite { path: PathBuf },
}

impl IndexBackend {
    /// Build a new index generation from embedded chunks.
    ///
    /// Building from zero entries is equivalent to [`IndexBackend::empty`].
    pub async fn build(&self, topic: &str, entries: Vec<IndexEntry>) -> Result<Arc<dyn VectorIndex>> {
        match self {
            IndexBackend::Memory => Ok(Arc::new(memory::FlatIndex::new(entries))),
            IndexBackend::Sqlite { path } => Ok(Arc::new(
                collection::CollectionIndex::create(path, topic, entries).await?,
            )),
        }
    }

    /// Build an explicitly empty index for the zero-document case.
    pub async fn empty(&self, topic: &str) -> Result<Arc<dyn VectorIndex>> {
        self.build(topic, Vec::new()).await
    }
}

/// Derive a fresh collection name from the topic and the current time,
/// filesystem/SQL safe. A process-wide sequence number keeps names unique
/// even when two rebuilds land in the same millisecond.
pub(crate) fn collection_name(topic: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let safe_topic: String = topic
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}", safe_topic, millis, seq)
}
