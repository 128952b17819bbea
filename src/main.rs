use link_unfurl::config::{Settings, load_settings};
use link_unfurl::error::{Result, UnfurlError};
use link_unfurl::extract::{FallbackAdapter, HtmlTagScraper, NoembedClient};
use link_unfurl::logging::init_tracing;
use link_unfurl::metadata::{CacheStore, Resolved};
use link_unfurl::pipeline::ResolutionPipeline;
use link_unfurl::server::{AppContext, create_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings come first so LOG_FORMAT can pick the subscriber
    let settings = load_settings()?;
    init_tracing(settings.log_format);

    tracing::info!("🚀 Starting link unfurl service");
    tracing::debug!(
        "Config: ttl={:?}, stale_policy={:?}, timeout={:?}, noembed={}",
        settings.cache.ttl,
        settings.cache.stale_policy,
        settings.extract.timeout,
        settings.extract.noembed_base_url
    );

    let pipeline = Arc::new(build_pipeline(&settings)?);
    tracing::info!(
        cache_enabled = settings.cache.enabled,
        "✅ Resolution pipeline initialized"
    );

    let maintenance = tokio::spawn(run_maintenance(
        pipeline.cache().clone(),
        settings.cache.maintenance_interval,
        settings.cache.stale_retention,
    ));

    let listener = TcpListener::bind(settings.server.bind_addr).await?;
    tracing::info!(addr = %settings.server.bind_addr, "Listening for preview requests");

    let app = create_router(AppContext::new(pipeline));
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let signal_name = setup_shutdown_handler().await;
            tracing::info!(
                signal = %signal_name,
                "Received shutdown signal, initiating graceful shutdown"
            );
        })
        .await;

    maintenance.abort();
    tracing::info!("Application shutdown sequence complete");
    result.map_err(UnfurlError::from)
}

fn build_pipeline(settings: &Settings) -> Result<ResolutionPipeline> {
    let client = reqwest::Client::builder()
        .user_agent(settings.extract.user_agent.as_str())
        .timeout(settings.extract.timeout)
        .build()?;

    let scraper = Arc::new(HtmlTagScraper::new(client.clone()));
    let provider = Arc::new(NoembedClient::with_base_url(
        client,
        settings.extract.noembed_base_url.clone(),
    ));
    let cache: Arc<CacheStore<Resolved>> = Arc::new(CacheStore::with_policy(
        settings.cache.ttl,
        settings.cache.stale_policy,
    ));

    Ok(ResolutionPipeline::new(
        cache,
        scraper,
        FallbackAdapter::new(provider),
        settings.extract.timeout,
    )
    .with_cache_enabled(settings.cache.enabled))
}

/// Periodically drop long-expired entries and report cache counters
async fn run_maintenance(
    cache: Arc<CacheStore<Resolved>>,
    interval: Duration,
    retention: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let removed = cache.cleanup_stale(retention);
        if removed > 0 {
            tracing::debug!(removed = removed, "Dropped stale cache entries");
        }
        cache.log_stats();
    }
}

/// Wait for SIGINT, SIGTERM or SIGQUIT (Ctrl+C elsewhere)
async fn setup_shutdown_handler() -> String {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let handlers = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::quit()),
        );

        match handlers {
            (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) => tokio::select! {
                _ = sigint.recv() => "SIGINT (Ctrl+C)".to_string(),
                _ = sigterm.recv() => "SIGTERM".to_string(),
                _ = sigquit.recv() => "SIGQUIT".to_string(),
            },
            _ => {
                tracing::warn!("Failed to install unix signal handlers, using Ctrl+C only");
                wait_for_ctrl_c().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await
    }
}

async fn wait_for_ctrl_c() -> String {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "Ctrl+C".to_string()
}
