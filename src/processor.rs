//! Per-topic ingestion pipeline: scan → extract → chunk → embed → index.
//!
//! Each topic owns one `DocumentProcessor`, which in turn owns the topic's
//! live vector index handle. A re-scan builds a complete new index
//! generation before publishing it, so concurrent queries always see
//! either the previous generation or the new one, never a torn state.
//! If embedding or index construction fails, the previous generation is
//! retained — an old index is better than none.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::sync::RwLock;
use tracing::{error, info};
use walkdir::WalkDir;

use crate::chunk::split_text;
use crate::embedding::Embedder;
use crate::extract::{extract, SUPPORTED_EXTENSIONS};
use crate::index::{IndexBackend, IndexEntry, ScoredChunk, VectorIndex};

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

pub struct DocumentProcessor {
    topic_name: String,
    docs_dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    backend: IndexBackend,
    /// Live index generation. `None` until the first successful scan.
    index: RwLock<Option<Arc<dyn VectorIndex>>>,
}

impl DocumentProcessor {
    pub fn new(
        topic_name: impl Into<String>,
        docs_dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        backend: IndexBackend,
    ) -> Self {
        Self {
            topic_name: topic_name.into(),
            docs_dir: docs_dir.into(),
            embedder,
            backend,
            index: RwLock::new(None),
        }
    }

    /// Scan the topic's document directory and build a fresh index
    /// generation, atomically replacing the previous one on success.
    ///
    /// Extraction failures are skipped and counted; they never abort the
    /// scan. Embedding or index-build failures abort this scan attempt
    /// and leave the previous generation in place.
    ///
    /// Returns a human-readable status summary.
    pub async fn scan_and_index(&self) -> Result<String> {
        let files = enumerate_files(&self.docs_dir)?;
        info!(
            topic = %self.topic_name,
            count = files.len(),
            dir = %self.docs_dir.display(),
            "found documents to process"
        );

        let mut extracted: Vec<(String, PathBuf)> = Vec::new();
        for path in &files {
            info!(topic = %self.topic_name, path = %path.display(), "processing");
            match extract(path) {
                Some(text) => extracted.push((text, path.clone())),
                None => {
                    error!(topic = %self.topic_name, path = %path.display(), "text extraction failed");
                }
            }
        }
        let processed = extracted.len();
        info!(topic = %self.topic_name, processed, "extraction done");

        let mut texts: Vec<String> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        for (text, path) in &extracted {
            for chunk in split_text(text) {
                texts.push(chunk);
                sources.push(path.display().to_string());
            }
        }

        if texts.is_empty() {
            let index = self.backend.empty(&self.topic_name).await?;
            *self.index.write().await = Some(index);
            return Ok(format!(
                "On topic '{}': no documents found to process",
                self.topic_name
            ));
        }

        let chunk_count = texts.len();
        let vectors = self.embedder.embed_batch(&texts).await?;
        let entries: Vec<IndexEntry> = texts
            .into_iter()
            .zip(sources)
            .zip(vectors)
            .map(|((text, source), vector)| IndexEntry {
                text,
                source,
                vector,
            })
            .collect();

        let index = self.backend.build(&self.topic_name, entries).await?;
        // Copy-then-swap: the new generation is complete before it is
        // published; readers holding the old Arc keep a coherent view.
        *self.index.write().await = Some(index);

        Ok(format!(
            "On topic '{}': {} chunks created from {} out of {} references",
            self.topic_name,
            chunk_count,
            processed,
            files.len()
        ))
    }

    /// Search the live index for chunks relevant to `query`.
    ///
    /// Returns an empty sequence when no index has been built yet.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let index = match self.index.read().await.clone() {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };
        let query_vec = self.embedder.embed(query).await?;
        index.search(&query_vec, k).await
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }
}

/// Recursively enumerate supported document files, sorted for
/// deterministic ordering.
fn enumerate_files(root: &Path) -> Result<Vec<PathBuf>> {
    let include = supported_globset()?;
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                error!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include.is_match(relative) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn supported_globset() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in SUPPORTED_EXTENSIONS {
        builder.add(
            GlobBuilder::new(&format!("**/*.{}", ext))
                .case_insensitive(true)
                .build()?,
        );
    }
    Ok(builder.build()?)
}
