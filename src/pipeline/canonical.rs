//! Request URL validation and cache key derivation
//!
//! Two URLs share a key when they differ only in scheme/host case, an explicit
//! default port, a fragment, a trailing slash on a non-root path, or the order
//! of query parameters. The key is never fetched; upstream calls use the
//! validated URL with only its fragment removed.

use crate::error::ResolveError;
use url::Url;

/// A validated request URL and the cache key it resolves under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// What the extractors fetch
    pub url: Url,
    /// What the cache is keyed by
    pub key: String,
}

/// Validate `raw` and derive its cache key.
pub fn canonicalize(raw: &str) -> Result<RequestTarget, ResolveError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ResolveError::invalid("`url` must not be empty"));
    }

    let mut url = Url::parse(raw).map_err(|e| {
        ResolveError::invalid(format!("`{}` is not a valid absolute URL: {}", raw, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ResolveError::invalid(format!(
            "unsupported URL scheme `{}`",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ResolveError::invalid(format!("`{}` has no host", raw)));
    }

    url.set_fragment(None);
    let key = cache_key(&url);

    Ok(RequestTarget { url, key })
}

fn cache_key(url: &Url) -> String {
    let mut key = url.clone();

    let path = key.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        key.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }

    // segments are compared as written, never decoded or re-encoded
    let query = url.query().map(|query| {
        let mut segments: Vec<&str> = query.split('&').filter(|s| !s.is_empty()).collect();
        segments.sort_by(|a, b| param_name(a).cmp(param_name(b)));
        segments.join("&")
    });
    key.set_query(query.as_deref().filter(|q| !q.is_empty()));

    key.into()
}

fn param_name(segment: &str) -> &str {
    segment.split_once('=').map_or(segment, |(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> String {
        canonicalize(raw).unwrap().key
    }

    fn fetched(raw: &str) -> String {
        canonicalize(raw).unwrap().url.to_string()
    }

    #[test]
    fn test_equivalent_urls_share_a_key() {
        let expected = "https://example.com/a/b?x=1&y=2";
        assert_eq!(key("https://example.com/a/b?x=1&y=2"), expected);
        assert_eq!(key("HTTPS://Example.COM/a/b/?y=2&x=1"), expected);
        assert_eq!(key("https://example.com:443/a/b?x=1&y=2#section"), expected);
        assert_eq!(key("  https://example.com/a/./b?y=2&x=1  "), expected);
    }

    #[test]
    fn test_root_and_empty_query() {
        assert_eq!(key("http://example.com"), "http://example.com/");
        assert_eq!(key("http://example.com/?"), "http://example.com/");
        assert_eq!(key("http://example.com/?&&"), "http://example.com/");
    }

    #[test]
    fn test_repeated_keys_keep_order() {
        assert_eq!(
            key("https://example.com/?tag=b&a=1&tag=a"),
            "https://example.com/?a=1&tag=b&tag=a"
        );
    }

    #[test]
    fn test_query_segments_are_not_reencoded() {
        assert_eq!(key("https://example.com/search?amp"), "https://example.com/search?amp");
        assert_eq!(key("https://example.com/p?a=1;b=2"), "https://example.com/p?a=1;b=2");
        assert_eq!(
            key("https://example.com/p?sig=a~b%2Fc&exp=1"),
            "https://example.com/p?exp=1&sig=a~b%2Fc"
        );
    }

    #[test]
    fn test_fetched_url_keeps_client_shape() {
        assert_eq!(
            fetched("https://example.com/a/b/?y=2&x=1&amp;c=d~e#top"),
            "https://example.com/a/b/?y=2&x=1&amp;c=d~e"
        );
        assert_eq!(fetched("http://example.com/page"), "http://example.com/page");
    }

    #[test]
    fn test_scheme_and_host_matter() {
        assert_ne!(key("http://example.com/"), key("https://example.com/"));
        assert_ne!(key("https://example.com/"), key("https://www.example.com/"));
    }

    #[test]
    fn test_rejects_invalid_urls() {
        for raw in ["", "   ", "not a url", "/relative/path", "ftp://example.com/file", "mailto:a@b.c"] {
            let err = canonicalize(raw).unwrap_err();
            assert!(
                matches!(err, ResolveError::InvalidRequest(_)),
                "{raw} should be rejected"
            );
        }
    }
}
