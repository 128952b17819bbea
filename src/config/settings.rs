use crate::error::{Result, UnfurlError};
use crate::extract::NOEMBED_BASE_URL;
use crate::logging::LogFormat;
use crate::metadata::StalePolicy;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub extract: ExtractConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub stale_policy: StalePolicy,
    /// How long a stale entry is kept around before maintenance drops it
    pub stale_retention: Duration,
    pub maintenance_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Upper bound for each extraction attempt
    pub timeout: Duration,
    pub noembed_base_url: String,
    pub user_agent: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(name: &str, default: &str) -> Result<T> {
    env_or(name, default)
        .trim()
        .parse()
        .map_err(|_| UnfurlError::Config(format!("Invalid {}", name)))
}

fn secs_env(name: &str, default: &str) -> Result<Duration> {
    parse_env::<u64>(name, default).map(Duration::from_secs)
}

pub fn load_settings() -> Result<Settings> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let server = ServerConfig {
        bind_addr: parse_env("BIND_ADDR", "0.0.0.0:8080")?,
    };

    let cache = CacheConfig {
        enabled: parse_env("CACHE_ENABLED", "true")?,
        ttl: secs_env("CACHE_TTL_SECS", "3600")?,
        stale_policy: parse_env("CACHE_STALE_POLICY", "background")?,
        stale_retention: secs_env("CACHE_STALE_RETENTION_SECS", "86400")?,
        maintenance_interval: secs_env("CACHE_MAINTENANCE_INTERVAL_SECS", "300")?,
    };
    if cache.maintenance_interval.is_zero() {
        return Err(UnfurlError::Config(
            "CACHE_MAINTENANCE_INTERVAL_SECS must be positive".to_string(),
        ));
    }

    let extract = ExtractConfig {
        timeout: secs_env("EXTRACT_TIMEOUT_SECS", "10")?,
        noembed_base_url: env_or("NOEMBED_BASE_URL", NOEMBED_BASE_URL),
        user_agent: env_or(
            "SCRAPER_USER_AGENT",
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
        ),
    };
    if extract.timeout.is_zero() {
        return Err(UnfurlError::Config(
            "EXTRACT_TIMEOUT_SECS must be positive".to_string(),
        ));
    }

    Ok(Settings {
        server,
        cache,
        extract,
        log_format: parse_env("LOG_FORMAT", "pretty")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_default() {
        let ttl: Duration = secs_env("LINK_UNFURL_TEST_UNSET_TTL", "42").unwrap();
        assert_eq!(ttl, Duration::from_secs(42));

        let policy: StalePolicy = parse_env("LINK_UNFURL_TEST_UNSET_POLICY", "blocking").unwrap();
        assert_eq!(policy, StalePolicy::Blocking);
    }

    #[test]
    fn test_parse_env_invalid_default() {
        let err = parse_env::<u64>("LINK_UNFURL_TEST_UNSET_NUM", "soon").unwrap_err();
        assert!(matches!(err, UnfurlError::Config(ref m) if m == "Invalid LINK_UNFURL_TEST_UNSET_NUM"));
    }
}
