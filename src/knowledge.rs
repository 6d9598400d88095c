//! Owner-approved conversation summaries.
//!
//! Summaries move through a two-step gate: `generate_summary` produces a
//! pending summary keyed by thread id; `store_summary` promotes it to an
//! append-only record on disk only once the topic owner approves. Pending
//! entries not approved simply live until overwritten or process restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

/// A generated-but-unapproved summary.
#[derive(Debug, Clone)]
pub struct PendingSummary {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted, owner-approved summary record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub thread_id: u64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

pub struct KnowledgeManager {
    summaries_dir: PathBuf,
    pending: Mutex<HashMap<u64, PendingSummary>>,
}

impl KnowledgeManager {
    pub fn new(summaries_dir: impl Into<PathBuf>) -> Result<Self> {
        let summaries_dir = summaries_dir.into();
        std::fs::create_dir_all(&summaries_dir).with_context(|| {
            format!(
                "Failed to create summaries directory: {}",
                summaries_dir.display()
            )
        })?;
        Ok(Self {
            summaries_dir,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Generate a summary for a conversation thread and hold it pending
    /// approval.
    ///
    /// Summarization quality is a placeholder; the contract here is the
    /// pending-then-approved state transition, not the text itself.
    pub fn generate_summary(&self, thread_id: u64) -> String {
        let summary = format!(
            "This is a summary of the conversation in thread {}. \
             It contains key points discussed and important information \
             that could be useful for future reference.",
            thread_id
        );
        self.pending
            .lock()
            .expect("pending summaries lock poisoned")
            .insert(
                thread_id,
                PendingSummary {
                    text: summary.clone(),
                    created_at: Utc::now(),
                },
            );
        summary
    }

    /// Promote the pending summary for `thread_id` to a persisted record.
    ///
    /// Returns `false` (persisting nothing) when no summary is pending.
    /// Records are append-only; nothing ever updates or deletes them.
    pub fn store_summary(&self, thread_id: u64) -> Result<bool> {
        let pending = {
            let mut map = self
                .pending
                .lock()
                .expect("pending summaries lock poisoned");
            match map.remove(&thread_id) {
                Some(p) => p,
                None => return Ok(false),
            }
        };

        let record = SummaryRecord {
            thread_id,
            summary: pending.text,
            created_at: pending.created_at,
        };
        let filename = format!(
            "summary_{}_{}.json",
            thread_id,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.summaries_dir.join(filename);
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        Ok(true)
    }

    /// Whether a summary is awaiting approval for `thread_id`.
    pub fn has_pending(&self, thread_id: u64) -> bool {
        self.pending
            .lock()
            .expect("pending summaries lock poisoned")
            .contains_key(&thread_id)
    }

    /// Read back all persisted summary records, skipping unreadable files.
    pub fn load_summaries(&self) -> Result<Vec<SummaryRecord>> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.summaries_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match std::fs::read_to_string(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|s| serde_json::from_str::<SummaryRecord>(&s).map_err(Into::into))
                {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "skipping unreadable summary");
                    }
                }
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
