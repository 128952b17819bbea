//! HTTP surface: `POST /` resolves a preview, `GET /health` reports liveness

mod error;

use crate::error::ResolveError;
use crate::metadata::ResolutionRequest;
use crate::pipeline::ResolutionPipeline;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub pipeline: Arc<ResolutionPipeline>,
}

impl AppContext {
    pub fn new(pipeline: Arc<ResolutionPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", post(resolve_preview))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn resolve_preview(State(ctx): State<AppContext>, body: Bytes) -> Response {
    let span = tracing::info_span!("resolve_preview", request_id = %Uuid::new_v4());

    async move {
        let req: ResolutionRequest = match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request body");
                return ResolveError::invalid("require `url`, `forceRefresh` & `raw`")
                    .into_response();
            }
        };

        tracing::debug!(
            url = %req.url,
            force_refresh = req.force_refresh,
            raw = req.raw,
            "Resolving preview"
        );

        match ctx.pipeline.resolve(&req).await {
            Ok(resolution) => encode_json(&resolution),
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Serialize a successful result, reporting failure as `EncodingFailed`
fn encode_json<T: Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => ResolveError::EncodingFailed(e.to_string()).into_response(),
    }
}

async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "cache_entries": ctx.pipeline.cache().len(),
    }))
}
