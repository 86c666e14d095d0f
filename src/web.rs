//! Web fallback context.
//!
//! When the knowledge base has nothing for a query, [`build_web_context`]
//! searches the web, fetches the first few result pages, strips them to
//! plain text, and returns a bounded `"[url]\ntext"` block. The builder
//! never fails: search or fetch errors are logged at debug level and the
//! affected page is skipped, so the worst case is an empty string.

use anyhow::{bail, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

use crate::chunk::normalize_whitespace;
use crate::config::WebConfig;
use crate::pack::BLOCK_SEPARATOR;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
const ACCEPT_LANGUAGE: &str = "uk,ru;q=0.9,en;q=0.8";

static HIDDEN_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<!--.*?-->")
        .unwrap()
});
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACES_AROUND_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*").unwrap());
static RESULT_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a\b[^>]*class="[^"]*\bresult__a\b[^"]*"[^>]*>"#).unwrap());
static HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)\bhref="([^"]*)""#).unwrap());

/// Network collaborator for the web fallback.
#[async_trait]
pub trait WebClient: Send + Sync {
    /// Up to `n` result URLs for `query`.
    async fn search(&self, query: &str, n: usize) -> Result<Vec<String>>;
    /// Raw HTML of `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`WebClient`] backed by DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoClient {
    client: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new(config: &WebConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebClient for DuckDuckGoClient {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<String>> {
        let url = format!(
            "https://duckduckgo.com/html/?q={}&kl=ua-uk&kp=1",
            urlencoding::encode(query.trim())
        );
        let html = self.fetch(&url).await?;
        Ok(parse_search_results(&html, n))
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} from {}", status, url);
        }
        let text = response.text().await?;
        if text.is_empty() {
            bail!("empty body from {}", url);
        }
        Ok(text)
    }
}

/// Extract result links from a DuckDuckGo HTML results page.
///
/// Redirect links (`//duckduckgo.com/l/?uddg=...`) are unwrapped; anything
/// that is not an external `http(s)` URL is dropped.
pub fn parse_search_results(html: &str, n: usize) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();

    for anchor in RESULT_ANCHOR.find_iter(html) {
        if links.len() >= n {
            break;
        }
        let Some(href) = HREF.captures(anchor.as_str()).and_then(|c| c.get(1)) else {
            continue;
        };
        let href = decode_entities(href.as_str());
        let target = unwrap_redirect(&href).unwrap_or(href);
        if target.starts_with("http") && !target.contains("duckduckgo.com") {
            links.push(target);
        }
    }

    links
}

fn unwrap_redirect(href: &str) -> Option<String> {
    let (_, query) = href.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("uddg="))
        .and_then(|v| urlencoding::decode(v).ok())
        .map(|v| v.into_owned())
}

/// Plain text of an HTML page, without script/style content, whitespace
/// normalized like the chunker's, cut to `max_chars` characters.
pub fn extract_text_from_html(html: &str, max_chars: usize) -> String {
    let visible = HIDDEN_BLOCKS.replace_all(html, " ");
    let text = TAGS.replace_all(&visible, "\n");
    let text = decode_entities(&text);
    let text = SPACES_AROUND_NEWLINE.replace_all(&text, "\n");
    truncate_chars(&normalize_whitespace(&text), max_chars)
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_pos, _)) => s[..byte_pos].to_string(),
        None => s.to_string(),
    }
}

/// Search, fetch, and pack web pages for `query`.
///
/// Returns an empty string when web fallback is disabled, no client is
/// configured, or nothing could be fetched.
pub async fn build_web_context(
    client: Option<&dyn WebClient>,
    config: &WebConfig,
    query: &str,
    max_pages: usize,
) -> String {
    let Some(client) = client else {
        return String::new();
    };
    if !config.enabled || query.trim().is_empty() {
        return String::new();
    }

    let urls = match client.search(query, max_pages).await {
        Ok(urls) => urls,
        Err(e) => {
            debug!("web search failed for {:?}: {:#}", query, e);
            return String::new();
        }
    };

    let mut blocks: Vec<String> = Vec::new();
    for url in urls.iter().take(max_pages) {
        let html = match client.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                debug!("fetch_url error {}: {:#}", url, e);
                continue;
            }
        };
        let plain = extract_text_from_html(&html, config.page_max_chars);
        if !plain.is_empty() {
            blocks.push(format!("[{}]\n{}", url, plain));
        }
    }

    truncate_chars(&blocks.join(BLOCK_SEPARATOR), config.max_chars)
}
