//! persona-chat - Persona chatbot service
//!
//! # Usage
//!
//! ```bash
//! # Serve the chat API (default subcommand)
//! persona-chat --addr 0.0.0.0:8000
//!
//! # Load persona facts into the context store
//! persona-chat seed --from entries.json
//!
//! # Run one retrieval and print the context block
//! persona-chat context --personality delhi "Where can I find good street food?"
//!
//! # List stored keys matching a glob
//! persona-chat keys "delhi:food:*"
//! ```
//!
//! # Environment Variables
//!
//! - `PERSONA_CONFIG`: Path to the TOML config (default: ./persona_chat.toml)
//! - `PERSONA_SERVER_ADDR`: Server bind address (same as `--addr`)
//! - `PERSONA_CORS_ORIGINS`: Comma-separated allowed origins (default: any)
//! - `GROQ_API_KEY`: LLM API key (variable name configurable via `llm.api_key_env`)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use persona_chat::api::{create_app, ApiState};
use persona_chat::config::{self, ChatConfig, StoreConfig};
use persona_chat::context::{scan_keys, ContextRetriever};
use persona_chat::{
    BoundedStore, ChatService, InteractionLog, KeyValueStore, LlmClient, OpenAiCompatClient,
    SledStore,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "persona-chat")]
#[command(about = "Persona chatbot service with contextual retrieval")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default from config: "0.0.0.0:8000")
    #[arg(short, long, global = true, env = "PERSONA_SERVER_ADDR")]
    addr: Option<String>,

    /// Path to a TOML config file (overrides PERSONA_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Serve the HTTP API
    Serve,

    /// Load a JSON object of key -> value pairs into the context store
    Seed {
        /// Path to the JSON file
        #[arg(long = "from")]
        from: PathBuf,
    },

    /// Run the retrieval engine once and print context and timings
    Context {
        /// Persona namespace
        #[arg(long, default_value = config::defaults::DEFAULT_PERSONALITY)]
        personality: String,
        /// The question to classify
        question: String,
    },

    /// List keys in the context store matching a glob pattern
    Keys {
        /// Redis-style glob, e.g. "delhi:food:*"
        pattern: String,
    },
}

// ============================================================================
// Wiring
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<ChatConfig> {
    match path {
        Some(p) => ChatConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(ChatConfig::load()),
    }
}

/// Open the sled context store behind the connection/timeout bound.
///
/// Returns `None` when the store is disabled or cannot be opened; the
/// service then answers without persona context.
fn open_context_store(store: &StoreConfig) -> Option<Arc<dyn KeyValueStore>> {
    if !store.enabled {
        info!("Context store disabled by config");
        return None;
    }

    match SledStore::open(&store.path) {
        Ok(sled) => {
            info!(
                path = %store.path.display(),
                keys = sled.count(),
                max_connections = store.max_connections,
                timeout_ms = store.operation_timeout_ms,
                "Context store opened"
            );
            Some(Arc::new(BoundedStore::new(
                sled,
                store.max_connections,
                store.operation_timeout(),
            )))
        }
        Err(e) => {
            warn!(path = %store.path.display(), error = %e, "Context store unavailable, continuing without context");
            None
        }
    }
}

fn open_interaction_log(config: &ChatConfig) -> Option<InteractionLog> {
    let log_config = &config.interaction_log;
    if !log_config.enabled {
        return None;
    }
    match InteractionLog::open(&log_config.path) {
        Ok(log) => {
            info!(path = %log_config.path.display(), records = log.count(), "Interaction log opened");
            Some(log)
        }
        Err(e) => {
            warn!(path = %log_config.path.display(), error = %e, "Interaction log unavailable, interactions will not be recorded");
            None
        }
    }
}

fn build_retriever(config: &ChatConfig) -> Result<Arc<ContextRetriever>> {
    let retriever = ContextRetriever::from_config(&config.retrieval)
        .context("Invalid category rules in [retrieval]")?;
    Ok(Arc::new(retriever))
}

// ============================================================================
// Subcommands
// ============================================================================

async fn run_server(config: &ChatConfig, addr: String) -> Result<()> {
    let retriever = build_retriever(config)?;
    let store = open_context_store(&config.store);
    let llm: Arc<dyn LlmClient> = Arc::new(
        OpenAiCompatClient::from_config(&config.llm).context("Failed to build LLM client")?,
    );

    let mut chat =
        ChatService::new(retriever, store, llm).with_default_model(&config.llm.default_model);
    if let Some(log) = open_interaction_log(config) {
        chat = chat.with_interaction_log(log);
    }
    let app = create_app(ApiState::new(Arc::new(chat)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await;

    match result {
        Ok(()) => {
            info!("[HttpServer] Graceful shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("[HttpServer] Server error: {}", e);
            Err(anyhow::anyhow!("HTTP server error: {}", e))
        }
    }
}

fn run_seed(config: &ChatConfig, from: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(from)
        .with_context(|| format!("Failed to read {}", from.display()))?;
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&raw).context("Seed file must be a JSON object of key -> value")?;

    let entries: Vec<(String, String)> = object
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect();

    let store = SledStore::open(&config.store.path)
        .with_context(|| format!("Failed to open store at {}", config.store.path.display()))?;
    let written = store.put_all(entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    store.flush()?;

    info!(written, total = store.count(), path = %config.store.path.display(), "Context store seeded");
    Ok(())
}

async fn run_context(config: &ChatConfig, personality: &str, question: &str) -> Result<()> {
    let retriever = build_retriever(config)?;
    let store = open_context_store(&config.store);
    let outcome = retriever
        .retrieve_context(question, store.as_deref(), personality)
        .await;

    let category = outcome
        .category
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    println!("category: {category}");
    println!("cit: {:.2} ms", outcome.cit_ms);
    println!("drt: {:.2} ms", outcome.drt_ms);
    println!("{}", outcome.context);
    Ok(())
}

async fn run_keys(config: &ChatConfig, pattern: &str) -> Result<()> {
    let store = open_context_store(&config.store).context("Context store is not available")?;
    let keys = scan_keys(store.as_ref(), pattern, config.retrieval.batch_size)
        .await
        .with_context(|| format!("Scan for '{pattern}' failed"))?;
    for key in &keys {
        println!("{key}");
    }
    info!(pattern, matched = keys.len(), "Key scan complete");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let chat_config = load_config(args.config.as_deref())?;
    chat_config
        .validate()
        .context("Configuration is invalid")?;
    config::init(chat_config);
    let cfg = config::get();

    match args.command.unwrap_or(SubCommand::Serve) {
        SubCommand::Serve => {
            let addr = args.addr.unwrap_or_else(|| cfg.server.addr.clone());
            info!("  persona-chat v{}", env!("CARGO_PKG_VERSION"));
            info!(
                model = %cfg.llm.default_model,
                categories = cfg.retrieval.categories.len(),
                batch_size = cfg.retrieval.batch_size,
                max_retries = cfg.retrieval.max_retries,
                "Retrieval engine configured"
            );
            run_server(cfg, addr).await?;
            info!("persona-chat shutdown complete");
        }
        SubCommand::Seed { from } => run_seed(cfg, &from)?,
        SubCommand::Context {
            personality,
            question,
        } => run_context(cfg, &personality, &question).await?,
        SubCommand::Keys { pattern } => run_keys(cfg, &pattern).await?,
    }

    Ok(())
}
