//! Resolution pipeline: cache lookup, primary/fallback chain, normalization

mod canonical;

pub use canonical::{RequestTarget, canonicalize};

use crate::error::{ResolveError, UpstreamError};
use crate::extract::{FallbackAdapter, TagExtractor};
use crate::logging::{Timer, log_error};
use crate::metadata::{CacheStore, Resolution, ResolutionRequest, Resolved};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Run `fut`, turning an elapsed deadline into [`UpstreamError::Timeout`]
async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, UpstreamError>>,
) -> Result<T, UpstreamError> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(UpstreamError::Timeout(timeout)))
}

/// Primary then fallback, each attempt bounded by `timeout`
#[derive(Clone)]
struct ExtractionChain {
    primary: Arc<dyn TagExtractor>,
    fallback: FallbackAdapter,
    timeout: Duration,
}

impl ExtractionChain {
    async fn run(self, url: String, raw: bool) -> Result<Resolved, ResolveError> {
        let primary_err = match bounded(self.timeout, self.primary.extract(&url)).await {
            Ok(tags) => return Ok(Resolved::from_tags(&url, tags)),
            Err(e) => e,
        };
        tracing::warn!(url = %url, error = %primary_err, "Primary extraction failed");

        if raw {
            return Err(ResolveError::RawUnsupportedOnFallback {
                cause: primary_err.to_string(),
            });
        }

        match bounded(self.timeout, self.fallback.fetch(&url)).await {
            Ok(metadata) => {
                tracing::info!(url = %url, "Returning embed provider data instead");
                Ok(Resolved::from_embed(metadata))
            }
            Err(fallback_err) => Err(ResolveError::ExtractionFailed {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        }
    }
}

/// Single entry point used by the request layer
pub struct ResolutionPipeline {
    cache: Arc<CacheStore<Resolved>>,
    chain: ExtractionChain,
    cache_enabled: bool,
}

impl ResolutionPipeline {
    pub fn new(
        cache: Arc<CacheStore<Resolved>>,
        primary: Arc<dyn TagExtractor>,
        fallback: FallbackAdapter,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            chain: ExtractionChain {
                primary,
                fallback,
                timeout,
            },
            cache_enabled: true,
        }
    }

    /// With caching disabled every request runs the chain itself
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore<Resolved>> {
        &self.cache
    }

    pub async fn resolve(&self, req: &ResolutionRequest) -> Result<Resolution, ResolveError> {
        let _timer = Timer::new("resolve");

        let target = canonicalize(&req.url)
            .inspect_err(|e| tracing::debug!(url = %req.url, error = %e, "Rejected request"))?;

        let mut outcome = self.load(&target, req.raw, req.force_refresh).await;

        // A raw leader skips the fallback, so a normal request that joined its
        // flight has to run the full chain on its own.
        if !req.raw && is_raw_refusal(&outcome) {
            tracing::debug!(key = %target.key, "Joined a raw-only fetch, resolving again");
            outcome = self.load(&target, false, req.force_refresh).await;
            if is_raw_refusal(&outcome) {
                outcome = self.chain.clone().run(target.url.to_string(), false).await;
            }
        }
        let resolved = outcome.inspect_err(|e| log_error("resolve", e))?;

        if !req.raw {
            return Ok(Resolution::Metadata(resolved.metadata));
        }

        match resolved.tags {
            Some(tags) => Ok(Resolution::Raw(tags)),
            None => Err(ResolveError::RawUnsupportedOnFallback {
                cause: format!("preview for {} came from the embed provider", target.key),
            }),
        }
    }

    async fn load(
        &self,
        target: &RequestTarget,
        raw: bool,
        force_refresh: bool,
    ) -> Result<Resolved, ResolveError> {
        let fetch = {
            let chain = self.chain.clone();
            let url = target.url.to_string();
            move || chain.run(url, raw)
        };

        if self.cache_enabled {
            self.cache.resolve(&target.key, fetch, force_refresh).await
        } else {
            fetch().await
        }
    }
}

fn is_raw_refusal(outcome: &Result<Resolved, ResolveError>) -> bool {
    matches!(outcome, Err(ResolveError::RawUnsupportedOnFallback { .. }))
}
