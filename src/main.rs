//! # Docent CLI
//!
//! Command-line front-end for the docent library. It stands in for a chat
//! platform client: messages arrive as `(channel, thread, query)` and the
//! reply is printed instead of posted.
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent scan` | Scan and index every configured topic |
//! | `docent ask --channel <id> "<query>"` | Route a query by channel and answer it |
//! | `docent summaries --topic <name>` | List persisted summary records for a topic |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docent::config::load_config;
use docent::llm::ChatMessage;
use docent::registry::TopicRegistry;

/// Docent — a topic-routed, retrieval-augmented question answering assistant.
#[derive(Parser)]
#[command(
    name = "docent",
    about = "A topic-routed, retrieval-augmented question answering assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan and index every configured topic, reporting a status line each.
    Scan,

    /// Route a query to the topic bound to a channel and answer it.
    Ask {
        /// Channel id the message arrived on.
        #[arg(long)]
        channel: u64,

        /// Thread id of the conversation (defaults to the channel id).
        #[arg(long)]
        thread: Option<u64>,

        /// The query text.
        query: String,
    },

    /// List persisted summary records for a topic.
    Summaries {
        /// Topic name.
        #[arg(long)]
        topic: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let registry = TopicRegistry::build(&config)?;

    match cli.command {
        Commands::Scan => {
            for (name, status) in registry.scan_all().await {
                match status {
                    Ok(summary) => println!("{}", summary),
                    Err(e) => println!("On topic '{}': scan failed: {:#}", name, e),
                }
            }
        }
        Commands::Ask {
            channel,
            thread,
            query,
        } => {
            let topic = match registry.resolve(channel) {
                Some(topic) => topic,
                None => {
                    // Policy for a directly addressed but unbound channel.
                    println!("Sorry I am not set up to support a topic in this channel.");
                    return Ok(());
                }
            };
            // A failed scan is reported but never blocks the reply; the
            // engine answers from whatever index exists, possibly none.
            match topic.scan_and_index().await {
                Ok(status) => println!("{}", status),
                Err(e) => println!("On topic '{}': scan failed: {:#}", topic.name(), e),
            }

            let thread_id = thread.unwrap_or(channel);
            let context = vec![ChatMessage::user(query.clone())];
            let reply = topic.process_query(thread_id, &query, &context).await;
            println!("{}", reply);
        }
        Commands::Summaries { topic } => {
            let found = registry.topics().iter().find(|t| t.name() == topic);
            match found {
                Some(topic) => {
                    let records = topic.knowledge().load_summaries()?;
                    if records.is_empty() {
                        println!("No summaries stored for '{}'", topic.name());
                    }
                    for record in records {
                        println!(
                            "[{}] thread {}: {}",
                            record.created_at.format("%Y-%m-%d %H:%M:%S"),
                            record.thread_id,
                            record.summary
                        );
                    }
                }
                None => anyhow::bail!("Unknown topic: {}", topic),
            }
        }
    }

    Ok(())
}
