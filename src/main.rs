//! # KB Context CLI (`kbctx`)
//!
//! Command-line front end for the knowledge-base index and the context
//! assembly pipeline.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbctx index` | Build the index, or load it if it is still fresh |
//! | `kbctx search "<query>"` | Print ranked chunks for a query |
//! | `kbctx context "<query>"` | Print the assembled prompt context and its source |
//! | `kbctx web "<query>"` | Print the web fallback context |
//! | `kbctx ask "<query>"` | Answer a question with the chat model |
//! | `kbctx stats` | Show index statistics |
//!
//! ## Examples
//!
//! ```bash
//! # Rebuild from scratch
//! kbctx index --force --config ./config/kb.toml
//!
//! # Lexical + semantic search
//! kbctx search "antenna RTK" --k 3
//!
//! # Full answer (needs OPENAI_API_KEY)
//! kbctx ask "Як відкалібрувати кермовий мотор?"
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kb_context::chat::{chat_with_retry, OpenAIChat};
use kb_context::config::{self, Config};
use kb_context::context::assemble_context;
use kb_context::embedding::{create_embedder, Embedder};
use kb_context::index::{build_or_load_index, load_index, KnowledgeBase};
use kb_context::prompt::{build_messages, PromptInputs};
use kb_context::retrieve::retrieve_with_extra;
use kb_context::stats::print_stats;
use kb_context::web::{build_web_context, DuckDuckGoClient, WebClient};

/// Knowledge-base retrieval and context assembly for the support bot.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kb.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "kbctx",
    about = "KB Context — knowledge-base retrieval and prompt context assembly",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kb.toml`. If the file does not exist, built-in
    /// defaults are used.
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index, or load it if no KB file changed.
    Index {
        /// Delete the persisted index first and rebuild everything.
        #[arg(long)]
        force: bool,
    },

    /// Print the chunks retrieved for a query, best first.
    Search {
        query: String,

        /// Number of literal matches to keep (default: `retrieval.k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Print the context that would be added to the chat prompt.
    Context {
        query: String,

        /// Character budget for KB context (default: `retrieval.max_context_chars`).
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Print the web fallback context for a query.
    Web {
        query: String,

        /// Number of result pages to fetch (default: `web.max_pages`).
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Answer a question with KB/web context and the chat model.
    Ask { query: String },

    /// Show statistics for the persisted index.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "kb_context=debug,kbctx=debug"
    } else {
        "kb_context=info,kbctx=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Index { force } => run_index(&cfg, force).await?,
        Commands::Search { query, k } => run_search(&cfg, &query, k).await?,
        Commands::Context { query, max_chars } => {
            let mut cfg = cfg;
            if let Some(max_chars) = max_chars {
                cfg.retrieval.max_context_chars = max_chars;
            }
            run_context(&cfg, &query).await?;
        }
        Commands::Web { query, max_pages } => {
            let client = web_client(&cfg);
            let pages = max_pages.unwrap_or(cfg.web.max_pages);
            let text = build_web_context(client.as_deref(), &cfg.web, &query, pages).await;
            if text.is_empty() {
                println!("No web context.");
            } else {
                println!("{}", text);
            }
        }
        Commands::Ask { query } => run_ask(&cfg, &query).await?,
        Commands::Stats => {
            let path = &cfg.kb.index_path;
            if !path.exists() {
                bail!(
                    "No index at {}. Run `kbctx index` first.",
                    path.display()
                );
            }
            let index = load_index(path)?;
            print_stats(&index, path);
        }
    }

    Ok(())
}

fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return config::load_config(path);
    }
    info!("config {} not found, using defaults", path.display());
    let cfg = Config::default();
    config::validate(&cfg)?;
    Ok(cfg)
}

fn web_client(cfg: &Config) -> Option<Arc<dyn WebClient>> {
    if !cfg.web.enabled {
        return None;
    }
    match DuckDuckGoClient::new(&cfg.web) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("web fallback unavailable: {:#}", e);
            None
        }
    }
}

async fn open_kb(cfg: &Config, embedder: &dyn Embedder) -> Result<KnowledgeBase> {
    let kb = KnowledgeBase::default();
    kb.reload(cfg, embedder).await?;
    Ok(kb)
}

async fn run_index(cfg: &Config, force: bool) -> Result<()> {
    let path = &cfg.kb.index_path;
    if force && path.exists() {
        std::fs::remove_file(path)?;
        info!("removed {}", path.display());
    }

    let embedder = create_embedder(&cfg.embedding)?;
    let index = build_or_load_index(cfg, embedder.as_ref()).await?;
    println!(
        "Index: {} files, {} chunks (model: {})",
        index.files.len(),
        index.chunk_count(),
        index.embedding_model_id
    );
    Ok(())
}

async fn run_search(cfg: &Config, query: &str, k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let embedder = create_embedder(&cfg.embedding)?;
    let kb = open_kb(cfg, embedder.as_ref()).await?;
    let snapshot = kb.snapshot();

    let k = k.unwrap_or(cfg.retrieval.k).max(1);
    let hits = retrieve_with_extra(
        &snapshot,
        embedder.as_ref(),
        query,
        k,
        cfg.retrieval.semantic_extra,
    )
    .await;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, chunk) in hits.iter().enumerate() {
        println!("{}. {}", rank + 1, chunk.tag());
        println!("    {}", excerpt(&chunk.text, 200));
        println!();
    }
    Ok(())
}

async fn run_context(cfg: &Config, query: &str) -> Result<()> {
    let embedder = create_embedder(&cfg.embedding)?;
    let kb = open_kb(cfg, embedder.as_ref()).await?;
    let client = web_client(cfg);

    let ctx = assemble_context(
        &kb.snapshot(),
        query,
        cfg,
        embedder.as_ref(),
        client.as_deref(),
    )
    .await;

    println!("Mode: {}", ctx.mode.label());
    if !ctx.text().is_empty() {
        println!();
        println!("{}", ctx.text());
    }
    Ok(())
}

async fn run_ask(cfg: &Config, query: &str) -> Result<()> {
    let chat = OpenAIChat::new(&cfg.chat)?;
    let embedder = create_embedder(&cfg.embedding)?;
    let kb = open_kb(cfg, embedder.as_ref()).await?;
    let client = web_client(cfg);

    let ctx = assemble_context(
        &kb.snapshot(),
        query,
        cfg,
        embedder.as_ref(),
        client.as_deref(),
    )
    .await;

    let messages = build_messages(&PromptInputs {
        prompt: &cfg.prompt,
        mode: ctx.mode,
        section_hint: None,
        kb_context: Some(&ctx.kb_context),
        web_context: Some(&ctx.web_context),
        history: &[],
        history_limit: cfg.chat.history_limit,
        user_text: query,
    });

    let label = format!("ask/{}", ctx.mode.label());
    let answer = chat_with_retry(&chat, &messages, &label, cfg.chat.max_attempts).await;
    if answer.is_empty() {
        println!("No answer.");
    } else {
        println!("{}", answer);
    }
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}
