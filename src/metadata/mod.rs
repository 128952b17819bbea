//! Link preview metadata: data model, normalization and the resolution cache
//!
//! Key features:
//! - Canonical preview schema shared by both extraction strategies
//! - Type-checked decoding of third-party provider responses
//! - TTL-based caching: 1-hour default (configurable)
//! - Single-flight: concurrent lookups of one key share a single fetch

mod cache;
pub mod normalize;
mod types;

pub use cache::{CacheStats, CacheStore, Cached, EntryState, StalePolicy};
pub use types::{
    DEFAULT_TYPE, MetadataResult, ProviderFields, RawTagSet, Resolution, ResolutionRequest,
    Resolved, Source,
};
