//! TOML configuration parsing and load-time validation.
//!
//! The configuration is a single immutable root: owners hold topics,
//! topics hold channel bindings. Runtime components refer back to it by
//! id (owner ids, topic names), never by live pointers, so the object
//! graph stays acyclic.
//!
//! Everything that would otherwise fail at routing or query time is
//! rejected here instead: empty credentials, non-positive ids, missing
//! document directories, and — critically — the same channel bound to
//! two topics. Routing assumes channel uniqueness already holds.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::index::IndexBackend;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    /// Trigger phrase for escalation to the topic owner.
    /// Matched exactly, case-insensitively, by the conversation engine.
    #[serde(default = "default_escalation_phrase")]
    pub escalation_phrase: String,
    pub owners: Vec<OwnerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL for the local (Ollama-compatible) provider.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            api_key: None,
            endpoint: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "keyword".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_backend")]
    pub backend: String,
    /// SQLite file path, required when `backend = "sqlite"`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            path: None,
        }
    }
}

fn default_index_backend() -> String {
    "memory".to_string()
}

impl IndexConfig {
    /// Resolve the backend tag into an [`IndexBackend`] once, at
    /// construction time.
    pub fn to_backend(&self) -> Result<IndexBackend> {
        match self.backend.as_str() {
            "memory" => Ok(IndexBackend::Memory),
            "sqlite" => {
                let path = self
                    .path
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("index.path required for sqlite backend"))?;
                Ok(IndexBackend::Sqlite { path })
            }
            other => anyhow::bail!("Unknown index backend: '{}'. Use memory or sqlite.", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_summaries_dir")]
    pub summaries_dir: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            summaries_dir: default_summaries_dir(),
        }
    }
}

fn default_summaries_dir() -> PathBuf {
    PathBuf::from("./data/summaries")
}

fn default_escalation_phrase() -> String {
    "escalate please".to_string()
}

/// One privileged owner identity and the topics it owns.
#[derive(Debug, Deserialize, Clone)]
pub struct OwnerConfig {
    pub owner_id: u64,
    pub topics: Vec<TopicConfig>,
}

/// One knowledge domain: persona prompt, document directory, channel bindings.
#[derive(Debug, Deserialize, Clone)]
pub struct TopicConfig {
    pub name: String,
    /// System-prompt text describing the assistant persona for this topic.
    pub role: String,
    pub docs_dir: PathBuf,
    pub channels: Vec<ChannelConfig>,
}

/// Binds a (server, channel) pair to the enclosing topic.
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    pub guild_id: u64,
    pub channel_id: u64,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Validate a parsed configuration. Fatal on the first problem found;
/// no topic is constructed from an invalid config.
pub fn validate(config: &Config) -> Result<()> {
    if config.llm.api_key.is_empty() {
        anyhow::bail!("llm.api_key cannot be empty");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.llm.max_tokens == 0 {
        anyhow::bail!("llm.max_tokens must be > 0");
    }
    if config.escalation_phrase.trim().is_empty() {
        anyhow::bail!("escalation_phrase cannot be empty");
    }

    match config.embedding.provider.as_str() {
        "openai" | "local" | "keyword" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, local, or keyword.",
            other
        ),
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.provider != "keyword" && config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    // Resolvable backend tag (path presence checked here too).
    config.index.to_backend()?;

    if config.owners.is_empty() {
        anyhow::bail!("At least one owner must be configured");
    }

    // channel -> topic name, for duplicate detection across all owners
    let mut bound_channels: HashMap<u64, String> = HashMap::new();

    for owner in &config.owners {
        if owner.owner_id == 0 {
            anyhow::bail!("owner_id must be positive");
        }
        let mut names: HashSet<&str> = HashSet::new();
        for topic in &owner.topics {
            if topic.name.trim().is_empty() {
                anyhow::bail!("Topic name cannot be empty (owner {})", owner.owner_id);
            }
            if !names.insert(topic.name.as_str()) {
                anyhow::bail!(
                    "Duplicate topic name '{}' for owner {}",
                    topic.name,
                    owner.owner_id
                );
            }
            if !topic.docs_dir.exists() {
                anyhow::bail!(
                    "Documents directory does not exist for topic '{}': {}",
                    topic.name,
                    topic.docs_dir.display()
                );
            }
            if topic.channels.is_empty() {
                anyhow::bail!("Topic '{}' has no channel bindings", topic.name);
            }
            for channel in &topic.channels {
                if channel.guild_id == 0 || channel.channel_id == 0 {
                    anyhow::bail!(
                        "Channel ids must be positive for topic '{}'",
                        topic.name
                    );
                }
                if let Some(previous) =
                    bound_channels.insert(channel.channel_id, topic.name.clone())
                {
                    anyhow::bail!(
                        "Channel {} is bound to both '{}' and '{}'",
                        channel.channel_id,
                        previous,
                        topic.name
                    );
                }
            }
        }
    }

    Ok(())
}
