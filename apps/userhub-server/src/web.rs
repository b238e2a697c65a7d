//! HTTP surface of the server: health probes and the shared middleware stack.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, middleware::from_fn, routing::get, Json, Router};
use runtime::ServerConfig;
use serde_json::{json, Value};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::request_id::{self, MakeReqId};

/// Something a readiness probe can round-trip to.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl HealthCheck for sea_orm::DatabaseConnection {
    async fn ping(&self) -> anyhow::Result<()> {
        sea_orm::DatabaseConnection::ping(self).await?;
        Ok(())
    }
}

async fn health(State(check): State<Arc<dyn HealthCheck>>) -> (StatusCode, Json<Value>) {
    match check.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (StatusCode::FAILED_DEPENDENCY, Json(json!({ "ok": "degraded" })))
        }
    }
}

/// `/_healthz` and `/_readyz`, both backed by the same check.
pub fn health_router(check: Arc<dyn HealthCheck>) -> Router {
    Router::new()
        .route("/_healthz", get(health))
        .route("/_readyz", get(health))
        .with_state(check)
}

/// Wrap the application router with request id, tracing, timeout, CORS and body limit.
///
/// Later `.layer` calls wrap earlier ones, so the list below runs from the
/// innermost layer (body limit) out to the request id assignment.
pub fn apply_middleware(router: Router, cfg: &ServerConfig) -> Router {
    let x_request_id = request_id::header();

    let mut router = router.layer(RequestBodyLimitLayer::new(cfg.body_limit_bytes));

    if cfg.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    if cfg.timeout_sec > 0 {
        router = router.layer(TimeoutLayer::new(Duration::from_secs(cfg.timeout_sec)));
    }

    router
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(from_fn(request_id::push_req_id_to_extensions))
        .layer(request_id::create_trace_layer())
        .layer(SetRequestIdLayer::new(x_request_id, MakeReqId))
}
