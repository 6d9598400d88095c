//! Topic construction and channel routing.
//!
//! At startup every configured topic gets its own [`DocumentProcessor`],
//! [`ConversationEngine`], and [`KnowledgeManager`] — topics share nothing
//! mutable, so rebuilds and queries on different topics are fully
//! independent. The registry also owns the channel → topic map, built once
//! from configuration; config validation has already guaranteed that a
//! channel is bound to at most one topic.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::engine::ConversationEngine;
use crate::knowledge::KnowledgeManager;
use crate::llm::{ChatMessage, ChatModel, OpenAiChat};
use crate::processor::DocumentProcessor;

/// One live knowledge domain: processor, engine, and summary store.
pub struct Topic {
    name: String,
    owner_id: u64,
    processor: Arc<DocumentProcessor>,
    engine: ConversationEngine,
    knowledge: KnowledgeManager,
}

impl Topic {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> u64 {
        self.owner_id
    }

    /// Scan this topic's document directory and (re)build its index.
    pub async fn scan_and_index(&self) -> Result<String> {
        self.processor.scan_and_index().await
    }

    /// Answer a query in a thread; always returns a reply string.
    pub async fn process_query(
        &self,
        thread_id: u64,
        query: &str,
        context: &[ChatMessage],
    ) -> String {
        self.engine.process_query(query, thread_id, context).await
    }

    pub fn is_following_thread(&self, thread_id: u64) -> bool {
        self.engine.is_following(thread_id)
    }

    pub fn generate_summary(&self, thread_id: u64) -> String {
        self.knowledge.generate_summary(thread_id)
    }

    pub fn store_summary(&self, thread_id: u64) -> Result<bool> {
        self.knowledge.store_summary(thread_id)
    }

    pub fn knowledge(&self) -> &KnowledgeManager {
        &self.knowledge
    }
}

/// All topics in the process, plus the inbound channel → topic map.
pub struct TopicRegistry {
    topics: Vec<Arc<Topic>>,
    by_channel: HashMap<u64, usize>,
}

impl TopicRegistry {
    /// Build the registry from a validated configuration, resolving the
    /// embedding backend, index backend, and chat model once.
    pub fn build(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChat::new(&config.llm));
        Self::build_with(config, embedder, chat)
    }

    /// Build with explicit embedding and chat backends (used by tests).
    pub fn build_with(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let backend = config.index.to_backend()?;

        let mut topics = Vec::new();
        let mut by_channel = HashMap::new();

        for owner in &config.owners {
            for topic_config in &owner.topics {
                let processor = Arc::new(DocumentProcessor::new(
                    topic_config.name.clone(),
                    topic_config.docs_dir.clone(),
                    embedder.clone(),
                    backend.clone(),
                ));
                let engine = ConversationEngine::new(
                    topic_config.role.clone(),
                    owner.owner_id,
                    config.escalation_phrase.clone(),
                    processor.clone(),
                    chat.clone(),
                );
                let knowledge = KnowledgeManager::new(
                    config.knowledge.summaries_dir.join(&topic_config.name),
                )?;

                let index = topics.len();
                topics.push(Arc::new(Topic {
                    name: topic_config.name.clone(),
                    owner_id: owner.owner_id,
                    processor,
                    engine,
                    knowledge,
                }));
                for channel in &topic_config.channels {
                    by_channel.insert(channel.channel_id, index);
                }
            }
        }

        Ok(Self { topics, by_channel })
    }

    /// Resolve an inbound channel to its topic, if any binding exists.
    pub fn resolve(&self, channel_id: u64) -> Option<&Arc<Topic>> {
        self.by_channel.get(&channel_id).map(|&i| &self.topics[i])
    }

    pub fn topics(&self) -> &[Arc<Topic>] {
        &self.topics
    }

    /// Scan every topic at startup. Topics are independent: one topic's
    /// failure is reported in its slot without affecting the others.
    pub async fn scan_all(&self) -> Vec<(String, Result<String>)> {
        let mut results = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            let status = topic.scan_and_index().await;
            results.push((topic.name().to_string(), status));
        }
        results
    }
}
