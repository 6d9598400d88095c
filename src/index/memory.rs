//! In-process flat vector index.
//!
//! Brute-force cosine similarity over all stored vectors. The store is
//! immutable after construction; a re-scan builds a new instance.

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{IndexEntry, ScoredChunk, VectorIndex};

/// Flat in-memory index over one generation of chunks.
pub struct FlatIndex {
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                text: e.text.clone(),
                source: e.source.clone(),
                score: cosine_similarity(query_vec, &e.vector),
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
        self.entries.len()
    }
}
