use crate::error::UpstreamError;
use crate::extract::TagExtractor;
use crate::metadata::RawTagSet;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect("static selector is valid"));
    };
}

selector!(META_SELECTOR, "meta[content]");
selector!(TITLE_SELECTOR, "head title");

/// Attributes that name a meta tag, in order of preference
const NAME_ATTRS: &[&str] = &["property", "name", "itemprop"];

/// Collect `<meta>` tags and the document title.
///
/// Keys are lowercased and the first occurrence of a key wins. `<title>` is
/// only used when no `title` meta tag exists.
pub fn parse_meta_tags(html: &str) -> RawTagSet {
    let document = Html::parse_document(html);
    let mut tags = RawTagSet::new();

    for element in document.select(&META_SELECTOR) {
        let Some(name) = NAME_ATTRS
            .iter()
            .find_map(|attr| element.value().attr(attr))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
        else {
            continue;
        };
        let content = element.value().attr("content").unwrap_or_default().trim();
        tags.entry(name).or_insert_with(|| content.to_string());
    }

    if !tags.contains_key("title") {
        if let Some(title) = document.select(&TITLE_SELECTOR).next() {
            let text = title.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                tags.insert("title".to_string(), text.to_string());
            }
        }
    }

    tags
}

/// Bytes of a page read before scraping stops; meta tags live in `<head>`
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Fetches a page and scrapes its tags
pub struct HtmlTagScraper {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HtmlTagScraper {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_max_body(client, MAX_BODY_BYTES)
    }

    pub fn with_max_body(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    /// Read at most `max_body_bytes` of the body, dropping the rest
    async fn read_head(&self, mut response: reqwest::Response) -> Result<String, UpstreamError> {
        let mut body = Vec::new();

        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= self.max_body_bytes {
                tracing::debug!(limit = self.max_body_bytes, "Page body truncated");
                break;
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl TagExtractor for HtmlTagScraper {
    async fn extract(&self, url: &str) -> Result<RawTagSet, UpstreamError> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("html") {
                return Err(UpstreamError::NoMetadata(format!(
                    "unsupported content type `{}`",
                    content_type
                )));
            }
        }

        let body = self.read_head(response).await?;
        let tags = tokio::task::spawn_blocking(move || parse_meta_tags(&body))
            .await
            .map_err(|e| UpstreamError::NoMetadata(format!("tag parsing aborted: {}", e)))?;
        if tags.is_empty() {
            return Err(UpstreamError::NoMetadata(format!(
                "no meta tags found at {}",
                url
            )));
        }

        tracing::debug!(url = %url, tag_count = tags.len(), "Scraped page tags");
        Ok(tags)
    }
}
