//! Extraction strategies
//!
//! The primary strategy scrapes the page's own structured tags; the fallback
//! asks a third-party embed provider about the URL.

mod fallback;
mod noembed;
mod scrape;

pub use fallback::FallbackAdapter;
pub use noembed::{NOEMBED_BASE_URL, NoembedClient};
pub use scrape::{HtmlTagScraper, MAX_BODY_BYTES, parse_meta_tags};

use crate::error::UpstreamError;
use crate::metadata::{ProviderFields, RawTagSet};
use async_trait::async_trait;

/// Primary strategy: produce the raw tag set of a page
#[async_trait]
pub trait TagExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<RawTagSet, UpstreamError>;
}

/// Fallback strategy: look the URL up with an embed provider
#[async_trait]
pub trait EmbedProvider: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ProviderFields, UpstreamError>;
}
