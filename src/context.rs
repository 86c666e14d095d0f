//! KB → web → plain fallback for one request.

use tracing::info;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::models::Index;
use crate::pack::pack_snippets;
use crate::prompt::SourceMode;
use crate::retrieve::retrieve_with_extra;
use crate::web::{build_web_context, WebClient};

/// Context chosen for a request, ready for [`crate::prompt::build_messages`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub mode: SourceMode,
    pub kb_context: String,
    pub web_context: String,
}

impl AssembledContext {
    fn plain() -> Self {
        Self {
            mode: SourceMode::Plain,
            kb_context: String::new(),
            web_context: String::new(),
        }
    }

    /// The context text for the chosen mode (empty in plain mode).
    pub fn text(&self) -> &str {
        match self.mode {
            SourceMode::Kb => &self.kb_context,
            SourceMode::Web => &self.web_context,
            SourceMode::Plain => "",
        }
    }
}

/// Pick the context for `query`: packed KB hits if retrieval finds any,
/// otherwise web text if the fallback is enabled and yields something,
/// otherwise nothing.
pub async fn assemble_context(
    index: &Index,
    query: &str,
    config: &Config,
    embedder: &dyn Embedder,
    web: Option<&dyn WebClient>,
) -> AssembledContext {
    let hits = retrieve_with_extra(
        index,
        embedder,
        query,
        config.retrieval.k,
        config.retrieval.semantic_extra,
    )
    .await;

    if !hits.is_empty() {
        let kb_context = pack_snippets(&hits, config.retrieval.max_context_chars);
        info!("[CTX] mode=KB, {} chunks, {} chars", hits.len(), kb_context.chars().count());
        return AssembledContext {
            mode: SourceMode::Kb,
            kb_context,
            web_context: String::new(),
        };
    }

    if config.web.enabled && web.is_some() {
        let web_context = build_web_context(web, &config.web, query, config.web.max_pages).await;
        if !web_context.is_empty() {
            info!("[CTX] mode=WEB, {} chars", web_context.chars().count());
            return AssembledContext {
                mode: SourceMode::Web,
                kb_context: String::new(),
                web_context,
            };
        }
    }

    info!("[CTX] mode=PLAIN");
    AssembledContext::plain()
}
