use crate::error::UpstreamError;
use crate::extract::EmbedProvider;
use crate::metadata::{MetadataResult, normalize};
use std::sync::Arc;

/// Fallback strategy: embed provider lookup plus validating decode
#[derive(Clone)]
pub struct FallbackAdapter {
    provider: Arc<dyn EmbedProvider>,
}

impl FallbackAdapter {
    pub fn new(provider: Arc<dyn EmbedProvider>) -> Self {
        Self { provider }
    }

    /// Fails only with [`UpstreamError::Unavailable`], [`UpstreamError::SchemaMismatch`]
    /// or the provider's own timeout.
    pub async fn fetch(&self, url: &str) -> Result<MetadataResult, UpstreamError> {
        let fields = self.provider.fetch(url).await?;

        normalize::from_provider(url, &fields).inspect_err(|e| {
            if let UpstreamError::SchemaMismatch(reason) = e {
                tracing::warn!(
                    url = %url,
                    reason = %reason,
                    "Embed provider returned an unexpected shape"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ProviderFields;
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticProvider(serde_json::Value);

    #[async_trait]
    impl EmbedProvider for StaticProvider {
        async fn fetch(&self, _url: &str) -> Result<ProviderFields, UpstreamError> {
            match &self.0 {
                serde_json::Value::Object(map) => Ok(map.clone()),
                _ => Err(UpstreamError::Unavailable("down".to_string())),
            }
        }
    }

    fn adapter(value: serde_json::Value) -> FallbackAdapter {
        FallbackAdapter::new(Arc::new(StaticProvider(value)))
    }

    #[tokio::test]
    async fn test_fetch_normalizes() {
        let result = adapter(json!({"title": "Hello", "thumbnail_url": "https://x/t.jpg"}))
            .fetch("https://example.com/p")
            .await
            .unwrap();

        assert_eq!(result.title, "Hello");
        assert_eq!(result.image, "https://x/t.jpg");
        assert_eq!(result.url, "https://example.com/p");
        assert_eq!(result.kind, "website");
    }

    #[tokio::test]
    async fn test_fetch_wrong_type() {
        let err = adapter(json!({"title": ["a"]}))
            .fetch("https://example.com/p")
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_passes_through() {
        let err = adapter(json!(null))
            .fetch("https://example.com/p")
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::Unavailable("down".to_string()));
    }
}
