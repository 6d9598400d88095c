//! Conversation engine: retrieval, prompt assembly, and reply generation.
//!
//! One engine per topic. Given a query, a thread id, and a caller-assembled
//! window of prior messages, the engine either short-circuits to an
//! escalation notice or retrieves relevant chunks, assembles the LLM
//! prompt, and returns the completion. Every failure path during query
//! processing yields a plain-language fallback string — the caller always
//! receives a usable reply, never an error.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};

use crate::llm::{ChatMessage, ChatModel};
use crate::processor::{DocumentProcessor, DEFAULT_TOP_K};

/// Reply when the provider answered with no content.
pub const EMPTY_COMPLETION_FALLBACK: &str = "I got an empty response. Please try again.";

/// Reply when the completion call failed outright.
pub const ERROR_FALLBACK: &str =
    "I apologize, but I encountered an error processing your request. Please try again later.";

/// Commands recognized in raw query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Hand the conversation off to the topic owner.
    Escalate,
    None,
}

/// Classify a query as a command.
///
/// The single source of truth for escalation matching: the query must
/// equal the configured trigger phrase exactly, case-insensitively.
/// Substring occurrences do not trigger.
pub fn classify_command(text: &str, escalation_phrase: &str) -> Command {
    if text.to_lowercase() == escalation_phrase.to_lowercase() {
        Command::Escalate
    } else {
        Command::None
    }
}

/// The set of threads a topic is following.
///
/// Unbounded over the process lifetime; bounded in practice by real
/// conversation volume. Kept behind this small interface so an evicting
/// implementation can replace it without touching the engine.
#[derive(Debug, Default)]
pub struct FollowSet {
    threads: HashSet<u64>,
}

impl FollowSet {
    pub fn add(&mut self, thread_id: u64) {
        self.threads.insert(thread_id);
    }

    pub fn contains(&self, thread_id: u64) -> bool {
        self.threads.contains(&thread_id)
    }

    pub fn evict(&mut self, thread_id: u64) {
        self.threads.remove(&thread_id);
    }
}

pub struct ConversationEngine {
    role: String,
    owner_id: u64,
    escalation_phrase: String,
    processor: Arc<DocumentProcessor>,
    chat: Arc<dyn ChatModel>,
    followed: Mutex<FollowSet>,
}

impl ConversationEngine {
    pub fn new(
        role: impl Into<String>,
        owner_id: u64,
        escalation_phrase: impl Into<String>,
        processor: Arc<DocumentProcessor>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            role: role.into(),
            owner_id,
            escalation_phrase: escalation_phrase.into(),
            processor,
            chat,
            followed: Mutex::new(FollowSet::default()),
        }
    }

    /// Whether this topic will respond in `thread_id` without a re-mention.
    pub fn is_following(&self, thread_id: u64) -> bool {
        self.followed
            .lock()
            .expect("follow set lock poisoned")
            .contains(thread_id)
    }

    /// Process a user query and produce a reply.
    ///
    /// `context` is the caller-assembled window of prior messages, oldest
    /// first. The reply is always a non-empty string: escalation notice,
    /// completion text, or a fallback message.
    pub async fn process_query(
        &self,
        query: &str,
        thread_id: u64,
        context: &[ChatMessage],
    ) -> String {
        self.followed
            .lock()
            .expect("follow set lock poisoned")
            .add(thread_id);

        if classify_command(query, &self.escalation_phrase) == Command::Escalate {
            return format!(
                "<@{}> Your consultation has been requested in this thread.",
                self.owner_id
            );
        }

        // Retrieval failures degrade to answering without references.
        let chunks = match self.processor.search(query, DEFAULT_TOP_K).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(topic = %self.processor.topic_name(), error = %e, "retrieval failed, answering without context");
                Vec::new()
            }
        };

        let mut system = self.role.clone();
        if !chunks.is_empty() {
            let reference: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            system.push_str(
                "\n\nHere is some relevant information to help answer the query:\n\n",
            );
            system.push_str(&reference.join("\n\n"));
        }
        debug!(
            topic = %self.processor.topic_name(),
            matched = chunks.len(),
            "assembled prompt"
        );

        match self.chat.complete(&system, context).await {
            Ok(Some(text)) => text,
            Ok(None) => EMPTY_COMPLETION_FALLBACK.to_string(),
            Err(e) => {
                error!(topic = %self.processor.topic_name(), error = %e, "completion call failed");
                ERROR_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::KeywordEmbedder;
    use crate::index::IndexBackend;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records prompts and counts calls; replies with a canned answer.
    struct RecordingChat {
        calls: AtomicUsize,
        last_system: Mutex<Option<String>>,
        reply: Option<&'static str>,
        fail: bool,
    }

    impl RecordingChat {
        fn replying(reply: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_system: Mutex::new(None),
                reply: Some(reply),
                fail: false,
            }
        }

        fn empty() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_system: Mutex::new(None),
                reply: None,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_system: Mutex::new(None),
                reply: None,
                fail: true,
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        async fn complete(
            &self,
            system: &str,
            _messages: &[ChatMessage],
        ) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_system.lock().unwrap() = Some(system.to_string());
            if self.fail {
                bail!("provider unreachable");
            }
            Ok(self.reply.map(|s| s.to_string()))
        }
    }

    fn engine_with(
        docs: &std::path::Path,
        chat: Arc<RecordingChat>,
    ) -> (ConversationEngine, Arc<DocumentProcessor>) {
        let processor = Arc::new(DocumentProcessor::new(
            "test",
            docs,
            Arc::new(KeywordEmbedder::new(64)),
            IndexBackend::Memory,
        ));
        let engine = ConversationEngine::new(
            "You are a helpful assistant.",
            7,
            "escalate please",
            processor.clone(),
            chat,
        );
        (engine, processor)
    }

    #[test]
    fn classify_exact_case_insensitive() {
        assert_eq!(
            classify_command("Escalate Please", "escalate please"),
            Command::Escalate
        );
        assert_eq!(
            classify_command("escalate please", "escalate please"),
            Command::Escalate
        );
    }

    #[test]
    fn classify_rejects_substring_match() {
        assert_eq!(
            classify_command("could you escalate please now", "escalate please"),
            Command::None
        );
        assert_eq!(classify_command("", "escalate please"), Command::None);
    }

    #[tokio::test]
    async fn escalation_skips_retrieval_and_llm() {
        let tmp = tempfile::tempdir().unwrap();
        let chat = Arc::new(RecordingChat::replying("should not be called"));
        let (engine, _) = engine_with(tmp.path(), chat.clone());

        let reply = engine.process_query("ESCALATE PLEASE", 1, &[]).await;
        assert_eq!(
            reply,
            "<@7> Your consultation has been requested in this thread."
        );
        assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn query_marks_thread_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let chat = Arc::new(RecordingChat::replying("ok"));
        let (engine, _) = engine_with(tmp.path(), chat);

        assert!(!engine.is_following(42));
        engine.process_query("hello", 42, &[]).await;
        assert!(engine.is_following(42));
    }

    #[tokio::test]
    async fn retrieved_chunks_land_in_system_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("cars.txt"), "facts about cars and engines").unwrap();
        let chat = Arc::new(RecordingChat::replying("an answer"));
        let (engine, processor) = engine_with(tmp.path(), chat.clone());
        processor.scan_and_index().await.unwrap();

        let reply = engine
            .process_query("cars", 1, &[ChatMessage::user("cars")])
            .await;
        assert_eq!(reply, "an answer");

        let system = chat.last_system.lock().unwrap().clone().unwrap();
        assert!(system.starts_with("You are a helpful assistant."));
        assert!(system.contains("facts about cars and engines"));
        assert!(system.contains("relevant information"));
    }

    #[tokio::test]
    async fn no_context_block_when_nothing_retrieved() {
        let tmp = tempfile::tempdir().unwrap();
        let chat = Arc::new(RecordingChat::replying("an answer"));
        let (engine, processor) = engine_with(tmp.path(), chat.clone());
        processor.scan_and_index().await.unwrap();

        engine.process_query("anything", 1, &[]).await;
        let system = chat.last_system.lock().unwrap().clone().unwrap();
        assert_eq!(system, "You are a helpful assistant.");
    }

    #[tokio::test]
    async fn empty_completion_yields_retry_message() {
        let tmp = tempfile::tempdir().unwrap();
        let chat = Arc::new(RecordingChat::empty());
        let (engine, _) = engine_with(tmp.path(), chat);

        let reply = engine.process_query("hello", 1, &[]).await;
        assert_eq!(reply, EMPTY_COMPLETION_FALLBACK);
    }

    #[tokio::test]
    async fn failed_completion_yields_apology() {
        let tmp = tempfile::tempdir().unwrap();
        let chat = Arc::new(RecordingChat::failing());
        let (engine, _) = engine_with(tmp.path(), chat);

        let reply = engine.process_query("hello", 1, &[]).await;
        assert_eq!(reply, ERROR_FALLBACK);
    }

    #[test]
    fn follow_set_evicts() {
        let mut set = FollowSet::default();
        set.add(1);
        assert!(set.contains(1));
        set.evict(1);
        assert!(!set.contains(1));
    }
}
