//! In-memory collaborators shared by unit tests

use crate::error::UpstreamError;
use crate::extract::{EmbedProvider, FallbackAdapter, TagExtractor};
use crate::metadata::{CacheStore, ProviderFields, RawTagSet};
use crate::pipeline::ResolutionPipeline;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn tags(pairs: &[(&str, &str)]) -> RawTagSet {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn down() -> UpstreamError {
    UpstreamError::Unavailable("connection refused".to_string())
}

/// Tag extractor with a swappable canned result
pub struct FakeScraper {
    calls: AtomicUsize,
    delay: Duration,
    result: Mutex<Result<RawTagSet, UpstreamError>>,
    last_url: Mutex<Option<String>>,
}

impl FakeScraper {
    pub fn new(result: Result<RawTagSet, UpstreamError>) -> Arc<Self> {
        Self::slow(result, Duration::ZERO)
    }

    pub fn slow(result: Result<RawTagSet, UpstreamError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            result: Mutex::new(result),
            last_url: Mutex::new(None),
        })
    }

    pub fn set(&self, result: Result<RawTagSet, UpstreamError>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

#[async_trait]
impl TagExtractor for FakeScraper {
    async fn extract(&self, url: &str) -> Result<RawTagSet, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.to_string());
        tokio::time::sleep(self.delay).await;
        self.result.lock().unwrap().clone()
    }
}

/// Embed provider returning a fixed JSON object
pub struct FakeProvider {
    calls: AtomicUsize,
    result: Result<ProviderFields, UpstreamError>,
}

impl FakeProvider {
    pub fn new(result: Result<serde_json::Value, UpstreamError>) -> Arc<Self> {
        let result = result.map(|value| match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("provider fixture must be an object"),
        });
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbedProvider for FakeProvider {
    async fn fetch(&self, _url: &str) -> Result<ProviderFields, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Pipeline over the fakes with a one minute TTL and one second timeout
pub fn pipeline(scraper: &Arc<FakeScraper>, provider: &Arc<FakeProvider>) -> ResolutionPipeline {
    ResolutionPipeline::new(
        Arc::new(CacheStore::new(Duration::from_secs(60))),
        scraper.clone(),
        FallbackAdapter::new(provider.clone()),
        Duration::from_secs(1),
    )
}
