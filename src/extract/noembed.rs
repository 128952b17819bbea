//! oEmbed lookups through noembed.com
//!
//! Reference: https://noembed.com/

use crate::error::UpstreamError;
use crate::extract::EmbedProvider;
use crate::metadata::ProviderFields;
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

pub const NOEMBED_BASE_URL: &str = "https://noembed.com";

pub struct NoembedClient {
    client: reqwest::Client,
    base_url: String,
}

impl NoembedClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, NOEMBED_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// `{base}/embed?url=<target, query-escaped>&format=json`
    fn embed_url(&self, target: &str) -> Result<Url, UpstreamError> {
        let mut endpoint = Url::parse(&format!("{}/embed", self.base_url.trim_end_matches('/')))
            .map_err(|e| UpstreamError::Unavailable(format!("invalid provider URL: {}", e)))?;
        endpoint
            .query_pairs_mut()
            .append_pair("url", target)
            .append_pair("format", "json");
        Ok(endpoint)
    }
}

#[async_trait]
impl EmbedProvider for NoembedClient {
    async fn fetch(&self, url: &str) -> Result<ProviderFields, UpstreamError> {
        let endpoint = self.embed_url(url)?;
        tracing::debug!(url = %url, "Querying embed provider");

        let response = self.client.get(endpoint).send().await?.error_for_status()?;
        let body: Value = response.json().await.map_err(|e| {
            UpstreamError::SchemaMismatch(format!("provider body is not JSON: {}", e))
        })?;

        match body {
            Value::Object(fields) => Ok(fields),
            _ => Err(UpstreamError::SchemaMismatch(
                "provider body is not a JSON object".to_string(),
            )),
        }
    }
}
