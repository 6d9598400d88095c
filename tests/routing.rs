//! Registry-level tests: channel routing, escalation, summaries, and the
//! always-a-reply contract, exercised through the same surface the chat
//! front-end uses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tempfile::TempDir;

use docent::config::{
    ChannelConfig, Config, EmbeddingConfig, IndexConfig, KnowledgeConfig, LlmConfig, OwnerConfig,
    TopicConfig,
};
use docent::embedding::{Embedder, KeywordEmbedder};
use docent::llm::{ChatMessage, ChatModel};
use docent::registry::TopicRegistry;

/// Counts completion calls; optionally fails or echoes a canned reply.
struct StubChat {
    calls: AtomicUsize,
    reply: Option<&'static str>,
}

#[async_trait]
impl ChatModel for StubChat {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[ChatMessage],
    ) -> anyhow::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(reply) => Ok(Some(reply.to_string())),
            None => bail!("provider unreachable"),
        }
    }
}

/// Fails every call, to model an embedding backend outage.
struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn model_name(&self) -> &str {
        "down"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        bail!("embedding backend down")
    }
}

fn two_topic_config(root: &std::path::Path) -> Config {
    let cars_dir = root.join("cars");
    let plants_dir = root.join("plants");
    std::fs::create_dir_all(&cars_dir).unwrap();
    std::fs::create_dir_all(&plants_dir).unwrap();
    std::fs::write(cars_dir.join("cars.txt"), "This sentence is about cars.").unwrap();
    std::fs::write(
        plants_dir.join("plants.txt"),
        "This sentence is about plants.",
    )
    .unwrap();

    Config {
        llm: LlmConfig {
            api_key: "test-key".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout_secs: 60,
        },
        embedding: EmbeddingConfig::default(),
        index: IndexConfig::default(),
        knowledge: KnowledgeConfig {
            summaries_dir: root.join("summaries"),
        },
        escalation_phrase: "escalate please".to_string(),
        owners: vec![
            OwnerConfig {
                owner_id: 100,
                topics: vec![TopicConfig {
                    name: "cars".to_string(),
                    role: "You are a car expert.".to_string(),
                    docs_dir: cars_dir,
                    channels: vec![ChannelConfig {
                        guild_id: 1,
                        channel_id: 11,
                    }],
                }],
            },
            OwnerConfig {
                owner_id: 200,
                topics: vec![TopicConfig {
                    name: "plants".to_string(),
                    role: "You are a gardener.".to_string(),
                    docs_dir: plants_dir,
                    channels: vec![
                        ChannelConfig {
                            guild_id: 1,
                            channel_id: 22,
                        },
                        ChannelConfig {
                            guild_id: 2,
                            channel_id: 33,
                        },
                    ],
                }],
            },
        ],
    }
}

fn registry_with(config: &Config, chat: Arc<StubChat>) -> TopicRegistry {
    TopicRegistry::build_with(config, Arc::new(KeywordEmbedder::new(128)), chat).unwrap()
}

#[test]
fn bound_channels_resolve_to_their_topics() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    docent::config::validate(&config).unwrap();
    let registry = registry_with(
        &config,
        Arc::new(StubChat {
            calls: AtomicUsize::new(0),
            reply: Some("ok"),
        }),
    );

    assert_eq!(registry.resolve(11).unwrap().name(), "cars");
    assert_eq!(registry.resolve(22).unwrap().name(), "plants");
    // A topic may have many bindings; each resolves to the same topic.
    assert_eq!(registry.resolve(33).unwrap().name(), "plants");
    assert!(registry.resolve(999).is_none());
}

#[test]
fn owner_identity_flows_from_config() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    let registry = registry_with(
        &config,
        Arc::new(StubChat {
            calls: AtomicUsize::new(0),
            reply: Some("ok"),
        }),
    );
    assert_eq!(registry.resolve(11).unwrap().owner_id(), 100);
    assert_eq!(registry.resolve(22).unwrap().owner_id(), 200);
}

#[tokio::test]
async fn scan_all_reports_every_topic() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    let registry = registry_with(
        &config,
        Arc::new(StubChat {
            calls: AtomicUsize::new(0),
            reply: Some("ok"),
        }),
    );

    let results = registry.scan_all().await;
    assert_eq!(results.len(), 2);
    for (name, status) in results {
        let status = status.unwrap();
        assert!(
            status.contains(&format!("On topic '{}'", name)),
            "status should name the topic: {}",
            status
        );
        assert!(status.contains("1 chunks created from 1 out of 1 references"));
    }
}

#[tokio::test]
async fn escalation_addresses_the_topic_owner() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    let chat = Arc::new(StubChat {
        calls: AtomicUsize::new(0),
        reply: Some("ok"),
    });
    let registry = registry_with(&config, chat.clone());

    let plants = registry.resolve(22).unwrap();
    let reply = plants.process_query(5, "Escalate Please", &[]).await;
    assert_eq!(
        reply,
        "<@200> Your consultation has been requested in this thread."
    );
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn query_answers_and_follows_thread() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    let chat = Arc::new(StubChat {
        calls: AtomicUsize::new(0),
        reply: Some("a canned answer"),
    });
    let registry = registry_with(&config, chat.clone());
    registry.scan_all().await;

    let cars = registry.resolve(11).unwrap();
    assert!(!cars.is_following_thread(77));
    let reply = cars
        .process_query(77, "tell me about cars", &[ChatMessage::user("tell me about cars")])
        .await;
    assert_eq!(reply, "a canned answer");
    assert!(cars.is_following_thread(77));
    assert_eq!(chat.calls.load(Ordering::SeqCst), 1);

    // Following is per topic, not global.
    let plants = registry.resolve(22).unwrap();
    assert!(!plants.is_following_thread(77));
}

#[tokio::test]
async fn provider_failure_still_produces_a_reply() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    let chat = Arc::new(StubChat {
        calls: AtomicUsize::new(0),
        reply: None,
    });
    let registry = registry_with(&config, chat);
    let cars = registry.resolve(11).unwrap();

    let reply = cars.process_query(1, "anything", &[]).await;
    assert_eq!(
        reply,
        "I apologize, but I encountered an error processing your request. Please try again later."
    );
}

#[tokio::test]
async fn failed_scan_still_answers_queries() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    let chat = Arc::new(StubChat {
        calls: AtomicUsize::new(0),
        reply: Some("a canned answer"),
    });
    let registry =
        TopicRegistry::build_with(&config, Arc::new(DownEmbedder), chat.clone()).unwrap();

    let cars = registry.resolve(11).unwrap();
    assert!(cars.scan_and_index().await.is_err());

    // Retrieval degrades to an empty context block; the reply still comes.
    let reply = cars
        .process_query(1, "tell me about cars", &[ChatMessage::user("tell me about cars")])
        .await;
    assert_eq!(reply, "a canned answer");
    assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn summary_approval_flow_per_topic() {
    let tmp = TempDir::new().unwrap();
    let config = two_topic_config(tmp.path());
    let registry = registry_with(
        &config,
        Arc::new(StubChat {
            calls: AtomicUsize::new(0),
            reply: Some("ok"),
        }),
    );

    let cars = registry.resolve(11).unwrap();
    assert!(!cars.store_summary(9).unwrap());

    let text = cars.generate_summary(9);
    assert!(cars.store_summary(9).unwrap());
    let records = cars.knowledge().load_summaries().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].summary, text);

    // Topics keep separate summary stores.
    let plants = registry.resolve(22).unwrap();
    assert!(plants.knowledge().load_summaries().unwrap().is_empty());
}
