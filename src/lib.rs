pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod server;

#[cfg(test)]
mod test_support;

pub use error::{ResolveError, Result, UnfurlError, UpstreamError};
