//! Link preview data model

use crate::metadata::normalize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default `type` for pages that don't declare one
pub const DEFAULT_TYPE: &str = "website";

/// Tag name to value, exactly as scraped from the page.
pub type RawTagSet = BTreeMap<String, String>;

/// Untyped field bag returned by an embed provider.
pub type ProviderFields = serde_json::Map<String, serde_json::Value>;

/// Incoming resolution request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequest {
    pub url: String,

    /// Bypass a fresh cache entry and fetch again
    #[serde(default)]
    pub force_refresh: bool,

    /// Return the unnormalized tag set instead of [`MetadataResult`]
    #[serde(default)]
    pub raw: bool,
}

impl ResolutionRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            force_refresh: false,
            raw: false,
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }
}

/// Canonical preview schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataResult {
    pub url: String,
    pub title: String,
    pub description: String,
    pub image: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for MetadataResult {
    fn default() -> Self {
        Self {
            url: String::new(),
            title: String::new(),
            description: String::new(),
            image: String::new(),
            kind: DEFAULT_TYPE.to_string(),
        }
    }
}

/// Which strategy produced a cached value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Structured tags scraped from the page itself
    Tags,
    /// Third-party embed provider
    Embed,
}

/// Value held by the resolution cache.
///
/// `tags` is only present when the page's own tags were scraped, which is what
/// makes raw mode servable from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub metadata: MetadataResult,
    pub tags: Option<RawTagSet>,
    pub source: Source,
}

impl Resolved {
    pub fn from_tags(url: &str, tags: RawTagSet) -> Self {
        Self {
            metadata: normalize::from_tags(url, &tags),
            tags: Some(tags),
            source: Source::Tags,
        }
    }

    pub fn from_embed(metadata: MetadataResult) -> Self {
        Self {
            metadata,
            tags: None,
            source: Source::Embed,
        }
    }
}

/// What the pipeline hands back to the request layer
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Resolution {
    Metadata(MetadataResult),
    Raw(RawTagSet),
}
