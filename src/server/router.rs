use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::api::api_router;
use crate::cache::CampDirectory;
use crate::policy::AccessPolicy;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Loaded once at startup.
    pub policy: AccessPolicy,
    pub camps: CampDirectory,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, policy: AccessPolicy, camp_cache_ttl: Duration) -> Self {
        Self {
            store,
            policy,
            camps: CampDirectory::new(camp_cache_ttl),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
