use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub kb: KbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KbConfig {
    #[serde(default = "default_kb_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            dir: default_kb_dir(),
            index_path: default_index_path(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_kb_dir() -> PathBuf {
    PathBuf::from("kb")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("kb/kb_index.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
    /// A sentence boundary is only used if it lies past this offset in the window.
    #[serde(default = "default_boundary_min_offset")]
    pub boundary_min_offset: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            min_chunk_chars: default_min_chunk_chars(),
            boundary_min_offset: default_boundary_min_offset(),
        }
    }
}

fn default_chunk_size() -> usize {
    900
}
fn default_overlap() -> usize {
    120
}
fn default_min_chunk_chars() -> usize {
    120
}
fn default_boundary_min_offset() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// How many semantic neighbours may be appended after literal hits.
    #[serde(default = "default_semantic_extra")]
    pub semantic_extra: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            semantic_extra: default_semantic_extra(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_k() -> usize {
    6
}
fn default_semantic_extra() -> usize {
    2
}
fn default_max_context_chars() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: Option<usize>,
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
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("text-embedding-3-small".to_string())
}
fn default_dims() -> Option<usize> {
    Some(1536)
}
fn default_batch_size() -> usize {
    256
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn disabled() -> Self {
        Self {
            provider: "disabled".to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Cap on the whole web context block.
    #[serde(default = "default_web_max_chars")]
    pub max_chars: usize,
    /// Cap on the text kept from a single page.
    #[serde(default = "default_page_max_chars")]
    pub page_max_chars: usize,
    #[serde(default = "default_web_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_pages: default_max_pages(),
            max_chars: default_web_max_chars(),
            page_max_chars: default_page_max_chars(),
            timeout_secs: default_web_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_pages() -> usize {
    3
}
fn default_web_max_chars() -> usize {
    6000
}
fn default_page_max_chars() -> usize {
    4000
}
fn default_web_timeout_secs() -> u64 {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            history_limit: default_history_limit(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4.1".to_string()
}
fn default_max_tokens() -> u32 {
    1200
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_attempts() -> u32 {
    1
}
fn default_history_limit() -> usize {
    14
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_company")]
    pub company: String,
    #[serde(default = "default_site")]
    pub site: String,
    #[serde(default = "default_phone")]
    pub phone: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            company: default_company(),
            site: default_site(),
            phone: default_phone(),
        }
    }
}

fn default_company() -> String {
    "FRENDT".to_string()
}
fn default_site() -> String {
    "frendt.ua".to_string()
}
fn default_phone() -> String {
    "+380674307870".to_string()
}

/// Load and validate a config file. Every section is optional.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.overlap must be smaller than chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if config.retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    // Validate web
    if config.web.enabled && config.web.max_pages == 0 {
        anyhow::bail!("web.max_pages must be >= 1 when web fallback is enabled");
    }

    Ok(())
}
